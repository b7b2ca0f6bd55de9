//! `search_food`: web search scoped to recipes, cuisines, and restaurants.
//!
//! The tool never fails the agent loop. Backend failures come back to the
//! model as plain text it can relay to the user.

use std::time::Duration;

use async_trait::async_trait;
use foodclaw_core::error::ToolError;
use foodclaw_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use tracing::{debug, warn};

const QUERY_SUFFIX: &str = " food recipe restaurant";
const MAX_RESULTS_CAP: usize = 10;

pub const NO_RESULTS: &str = "No results found.";
pub const RATE_LIMITED: &str = "Rate limit reached. Please try again later.";

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub body: String,
    pub url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("rate limited")]
    RateLimited,

    #[error("{0}")]
    Failed(String),
}

/// A web search service.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// DuckDuckGo Instant Answer API.
pub struct DuckDuckGoBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl DuckDuckGoBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("foodclaw/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SearchError::Failed(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    fn parse(answer: InstantAnswer, max_results: usize) -> Vec<SearchHit> {
        let mut hits = Vec::new();

        if !answer.abstract_text.is_empty() {
            hits.push(SearchHit {
                title: if answer.heading.is_empty() {
                    "No title".into()
                } else {
                    answer.heading.clone()
                },
                body: answer.abstract_text.clone(),
                url: Some(answer.abstract_url.clone()).filter(|u| !u.is_empty()),
            });
        }

        let mut topics: Vec<&Topic> = Vec::new();
        for topic in &answer.related_topics {
            match topic {
                RelatedTopic::Group { topics: nested } => topics.extend(nested.iter()),
                RelatedTopic::Single(t) => topics.push(t),
            }
        }
        for topic in topics {
            if topic.text.is_empty() {
                continue;
            }
            let (title, body) = match topic.text.split_once(" - ") {
                Some((t, b)) => (t.to_string(), b.to_string()),
                None => (topic.text.clone(), String::new()),
            };
            hits.push(SearchHit {
                title,
                body,
                url: Some(topic.first_url.clone()).filter(|u| !u.is_empty()),
            });
        }

        hits.truncate(max_results);
        hits
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoBackend {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
                ("kl", "us-en"),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Failed(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(SearchError::RateLimited);
        }
        if !status.is_success() {
            return Err(SearchError::Failed(format!("search service returned {status}")));
        }
        let answer: InstantAnswer = response
            .json()
            .await
            .map_err(|e| SearchError::Failed(e.to_string()))?;
        Ok(Self::parse(answer, max_results))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<Topic>,
    },
    Single(Topic),
}

#[derive(Debug, Deserialize)]
struct Topic {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "FirstURL", default)]
    first_url: String,
}

/// Render hits as numbered entries separated by blank lines.
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_RESULTS.into();
    }
    hits.iter()
        .enumerate()
        .map(|(i, h)| format!("{}. {}\n   {}", i + 1, h.title, h.body))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct SearchFoodTool {
    backend: Box<dyn SearchBackend>,
    default_max_results: usize,
}

impl SearchFoodTool {
    pub fn new(backend: Box<dyn SearchBackend>, default_max_results: usize) -> Self {
        Self {
            backend,
            default_max_results,
        }
    }
}

#[async_trait]
impl Tool for SearchFoodTool {
    fn name(&self) -> &str {
        "search_food"
    }

    fn description(&self) -> &str {
        "Search for food information, recipes, cuisines, or restaurant recommendations."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query about food"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return",
                    "default": self.default_max_results
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let max_results = arguments["max_results"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(self.default_max_results)
            .clamp(1, MAX_RESULTS_CAP);

        let full_query = format!("{query}{QUERY_SUFFIX}");
        debug!(query = %full_query, max_results, "search_food");

        let (success, output) = match self.backend.search(&full_query, max_results).await {
            Ok(hits) => (true, format_hits(&hits)),
            Err(SearchError::RateLimited) => {
                warn!("search_food rate limited");
                (false, RATE_LIMITED.to_string())
            }
            Err(e) => {
                warn!(error = %e, "search_food failed");
                (false, format!("Search error: {e}"))
            }
        };

        Ok(ToolResult {
            call_id: String::new(),
            success,
            output,
        })
    }
}
