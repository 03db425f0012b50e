//! Suggested next steps from a hosted generative model
//!
//! The model is optional. No API key, a timeout, a non-2xx reply or an
//! unparsable body all produce the static fallback list; callers never see
//! a recommendation error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use tracker_core::recommendations::{
    build_prompt, fallback_suggestions, parse_suggestions, Suggestion, SuggestionContext,
};

use crate::config::RecommenderConfig;

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("recommender is not configured")]
    NotConfigured,
    #[error("recommender request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("recommender returned status {0}")]
    Status(u16),
    #[error("recommender reply had no text")]
    EmptyReply,
}

/// Anything that turns a prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, RecommendError>;
}

/// `generateContent`-style HTTP client
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &RecommenderConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[derive(Deserialize)]
struct GenerateReply {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, RecommendError> {
        let key = self.api_key.as_deref().ok_or(RecommendError::NotConfigured)?;

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.7, "maxOutputTokens": 500 },
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(RecommendError::Status(resp.status().as_u16()));
        }

        let reply: GenerateReply = resp.json().await?;
        reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(RecommendError::EmptyReply)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub suggestions: Vec<Suggestion>,
    /// True when the static list was served
    pub fallback: bool,
}

pub struct RecommendationService {
    generator: Box<dyn TextGenerator>,
}

impl RecommendationService {
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn from_config(config: &RecommenderConfig) -> Self {
        Self::new(Box::new(GeminiClient::new(config)))
    }

    pub async fn suggest(&self, ctx: &SuggestionContext) -> Recommendations {
        let prompt = build_prompt(ctx);

        let text = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(RecommendError::NotConfigured) => {
                debug!("Recommender not configured, serving fallback suggestions");
                return Self::fallback();
            }
            Err(e) => {
                warn!("Recommender unavailable, serving fallback suggestions: {}", e);
                return Self::fallback();
            }
        };

        match parse_suggestions(&text) {
            Ok(suggestions) => Recommendations {
                suggestions,
                fallback: false,
            },
            Err(e) => {
                warn!("Unusable recommender reply, serving fallback suggestions: {}", e);
                Self::fallback()
            }
        }
    }

    fn fallback() -> Recommendations {
        Recommendations {
            suggestions: fallback_suggestions(),
            fallback: true,
        }
    }
}
