//! OpenAI-compatible chat-completions assessment client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{AssessmentError, AssessmentRequest, AssessmentService};
use crate::config::AssessmentSettings;

const USER_AGENT: &str = concat!("shellmatch-engine/", env!("CARGO_PKG_VERSION"));

/// Transport-level ceiling; the adapter applies the per-call timeout
const HTTP_TIMEOUT_SECS: u64 = 300;

const SYSTEM_PROMPT: &str = "\
You validate proposed parent-child relationships between company accounts.
Each request names a customer account and a candidate parent (shell) account,
with their websites and billing addresses, plus three computed signals:
websiteMatch, nameMatch and addressConsistency (each a 0-100 score with a short
explanation).

Start from what you know about the companies involved: subsidiaries, acquisitions,
franchises, regional offices and brand conventions. Then weigh the computed
signals. Known relationships justify high confidence even when the signals are
weak; contradicted relationships justify low confidence even when they are
strong. Address differences are acceptable for remote offices and franchises.
If you have no outside knowledge of either company, say so and rely on the
signals alone.

Reply with JSON only, exactly in this shape:
{\"confidence\": <integer 0-100>, \"explanationBullets\": [\"...\", \"...\"]}
Give 3 to 5 bullets of at most 25 words each.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct OpenAiAssessmentClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiAssessmentClient {
    pub fn new(settings: &AssessmentSettings, api_key: String) -> Result<Self, AssessmentError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AssessmentError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
        })
    }

    fn build_body(&self, request: &AssessmentRequest) -> Result<ChatRequest<'_>, AssessmentError> {
        let payload = serde_json::to_string_pretty(request)
            .map_err(|e| AssessmentError::Schema(format!("request serialization: {}", e)))?;

        Ok(ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Assess this customer-to-shell account match recommendation:\n\n{}",
                        payload
                    ),
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        })
    }
}

#[async_trait]
impl AssessmentService for OpenAiAssessmentClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn assess(&self, request: &AssessmentRequest) -> Result<String, AssessmentError> {
        let body = self.build_body(request)?;
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(model = %self.model, "Requesting assessment");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssessmentError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&error_text)
                .map(|b| b.error.message)
                .unwrap_or(error_text);
            return Err(AssessmentError::ApiError(status.as_u16(), message));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AssessmentError::Schema(format!("malformed completion: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AssessmentError::Schema("completion has no content".to_string()))
    }
}
