//! HTTP research adapter.
//!
//! Sends one chat-completion style request per career title and classifies
//! the reply as a structured document or free narrative text.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use pathwise_shared::{PathwiseError, ResearchConfig, Result};

use crate::document::ResearchDocument;
use crate::{ResearchAdapter, UpstreamResponse};

/// User-Agent string for research requests.
const USER_AGENT: &str = concat!("Pathwise/", env!("CARGO_PKG_VERSION"));

/// Longest title forwarded to the service.
const MAX_TITLE_CHARS: usize = 120;

const SYSTEM_PROMPT: &str = "You are a UK careers research assistant. Answer only with \
verifiable, current figures and cite your sources. Respond with a single JSON object \
with the keys salary (entry, mid, senior as ranges such as \"£22,000 - £28,000\", \
currency, byRegion), marketDemand, educationPathways, workEnvironment, automationRisk, \
industryGrowth and competencies. Omit any key you cannot verify; never estimate.";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    citations: Option<Vec<String>>,
    #[serde(default)]
    search_results: Option<Vec<SearchResult>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    url: String,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Research adapter backed by an HTTP chat-completions endpoint.
pub struct HttpResearchAdapter {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: String,
}

impl HttpResearchAdapter {
    /// Build an adapter from config and an API key.
    pub fn new(config: &ResearchConfig, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = config.endpoint_url()?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                PathwiseError::UpstreamUnavailable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    fn build_request(&self, title: &str) -> ChatRequest<'_> {
        let title: String = title.trim().chars().take(MAX_TITLE_CHARS).collect();
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Research the current UK job market for the career \"{title}\": \
                         salary bands by seniority, demand, education routes, working \
                         environment, automation risk and growth outlook."
                    ),
                },
            ],
        }
    }
}

impl ResearchAdapter for HttpResearchAdapter {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch(&self, title: &str) -> Result<UpstreamResponse> {
        let request = self.build_request(title);

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PathwiseError::UpstreamUnavailable(format!("{title}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PathwiseError::UpstreamUnavailable(format!(
                "{title}: HTTP {status}"
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| PathwiseError::malformed(format!("{title}: unreadable body: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| PathwiseError::malformed(format!("{title}: empty completion")))?;

        let citations = match (body.citations, body.search_results) {
            (Some(citations), _) if !citations.is_empty() => citations,
            (_, Some(results)) => results.into_iter().map(|r| r.url).collect(),
            _ => Vec::new(),
        };

        debug!(
            content_len = content.len(),
            citations = citations.len(),
            "research response received"
        );

        Ok(classify_content(content, citations))
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Decide whether completion text is a structured document or narrative.
///
/// A JSON object, bare or inside a fenced code block, that deserializes into a
/// [`ResearchDocument`] with at least one section is structured. Anything else
/// is kept verbatim as free text.
pub fn classify_content(content: String, citations: Vec<String>) -> UpstreamResponse {
    static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*\})\s*```").expect("valid regex")
    });

    let trimmed = content.trim();
    let candidate = if let Some(caps) = FENCED_JSON_RE.captures(trimmed) {
        caps.get(1).map(|m| m.as_str())
    } else if trimmed.starts_with('{') && trimmed.ends_with('}') {
        Some(trimmed)
    } else {
        None
    };

    if let Some(json) = candidate {
        match serde_json::from_str::<ResearchDocument>(json) {
            Ok(document) if !document.is_empty() => {
                return UpstreamResponse::Structured {
                    document,
                    citations,
                    raw_len: content.chars().count(),
                };
            }
            Ok(_) => debug!("JSON reply had no recognised sections, treating as text"),
            Err(e) => warn!(
                error = %e,
                "JSON reply did not match document shape, treating as text"
            ),
        }
    }

    UpstreamResponse::FreeText {
        text: content,
        citations,
    }
}
