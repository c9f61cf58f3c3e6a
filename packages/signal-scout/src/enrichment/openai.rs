//! Enrichment through an OpenAI-compatible chat completions endpoint.
//!
//! Works against hosted APIs and local servers (LM Studio, llama.cpp,
//! vLLM). The model is asked for a single JSON object; anything else is
//! treated as unavailable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EnrichError, Result, ScoutError};
use crate::security::ApiKey;
use crate::traits::enricher::{Enricher, Enrichment, EnrichmentRequest};
use crate::types::EnrichmentConfig;

const SYSTEM_PROMPT: &str = "You are an expert web content analyst. You must respond ONLY with valid JSON.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Fields the model must return. All four are required.
#[derive(Debug, Deserialize)]
struct Analysis {
    service_name: String,
    primary_category: String,
    confidence_reasoning: String,
    #[serde(alias = "is_streaming_portal")]
    is_target: bool,
}

/// OpenAI-compatible enricher.
pub struct OpenAiEnricher {
    client: reqwest::Client,
    api_key: Option<ApiKey>,
    config: EnrichmentConfig,
}

impl OpenAiEnricher {
    pub fn new(config: EnrichmentConfig, api_key: Option<ApiKey>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ScoutError::Config {
                reason: format!("failed to build enrichment client: {e}"),
            })?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn request(&self, request: &EnrichmentRequest) -> std::result::Result<Enrichment, EnrichError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(request, &self.config.categories),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            builder = key.authorize(builder);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        if !response.status().is_success() {
            return Err(EnrichError::Status(response.status().as_u16()));
        }

        let chat: ChatResponse = response.json().await.map_err(map_reqwest_error)?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EnrichError::Malformed("no completion content".to_string()))?;

        debug!(url = %request.url, response = %content, "Enrichment raw response");
        parse_analysis(&content)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> EnrichError {
    if e.is_timeout() {
        EnrichError::Timeout
    } else if e.is_decode() {
        EnrichError::Malformed(e.to_string())
    } else {
        EnrichError::Transport(e.to_string())
    }
}

#[async_trait]
impl Enricher for OpenAiEnricher {
    async fn enrich(&self, request: &EnrichmentRequest) -> Enrichment {
        match self.request(request).await {
            Ok(enrichment) => {
                if let Enrichment::Enriched { category, is_target, .. } = &enrichment {
                    info!(url = %request.url, category = %category, is_target, "Enrichment complete");
                }
                enrichment
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Enrichment unavailable");
                Enrichment::Unavailable
            }
        }
    }
}

/// Build the user prompt. The summary arrives already cut to length.
pub fn build_prompt(request: &EnrichmentRequest, categories: &[String]) -> String {
    let content = &request.content_summary;
    let categories: String = categories.iter().map(|c| format!("- \"{c}\"\n")).collect();
    let title = request.title.as_deref().unwrap_or("");

    format!(
        r#"Analyze the text from a website and determine its purpose. Respond ONLY with a single, valid JSON object and nothing else.

Example of the expected format:
{{
  "service_name": "StreamEast",
  "primary_category": "Sports Streaming",
  "confidence_reasoning": "The text mentions live NFL games, provides streaming links, and includes sports schedules.",
  "is_target": true
}}

"is_target" is true only for sites that stream live sports or other video content.

Categories to choose from:
{categories}
URL: {url}
Title: {title}

Content:
{content}"#,
        url = request.url,
    )
}

/// Parse the model's reply into an `Enrichment`.
///
/// Accepts a bare JSON object or one embedded in surrounding text (the
/// outermost `{...}` span).
pub fn parse_analysis(text: &str) -> std::result::Result<Enrichment, EnrichError> {
    let text = text.trim();
    let analysis: Analysis = match serde_json::from_str(text) {
        Ok(analysis) => analysis,
        Err(first) => {
            let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
                return Err(EnrichError::Malformed(first.to_string()));
            };
            if end <= start {
                return Err(EnrichError::Malformed(first.to_string()));
            }
            serde_json::from_str(&text[start..=end]).map_err(|e| EnrichError::Malformed(e.to_string()))?
        }
    };

    Ok(Enrichment::Enriched {
        service_name: analysis.service_name,
        category: analysis.primary_category,
        reasoning: analysis.confidence_reasoning,
        is_target: analysis.is_target,
    })
}
