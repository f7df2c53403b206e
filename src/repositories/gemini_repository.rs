use crate::config::config::ModelConfig;
use crate::model::{ModelClient, Part, PromptPayload};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Google Generative Language API (`generateContent`) client.
pub struct GeminiRepository {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("Error building HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Model API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Prompt was blocked: {0}")]
    Blocked(String),
    #[error("Model returned no text")]
    EmptyResponse,
}

impl GeminiRepository {
    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self, InitializationError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout.duration());
        }
        let endpoint = config.generate_content_url();
        info!("Using model {} at {}", config.name(), endpoint);
        Ok(Self {
            client: builder.build()?,
            endpoint,
            api_key,
        })
    }
}

impl ModelClient for GeminiRepository {
    type Error = ModelError;

    async fn generate(&self, payload: &PromptPayload) -> Result<String, ModelError> {
        let body = GenerateContentRequest::from(payload);
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiErrorResponse>().await {
                Ok(body) => body.error.message,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let response: GenerateContentResponse = response.json().await?;
        debug!(
            "Received {} candidate(s) from the model",
            response.candidates.len()
        );
        response.into_text()
    }
}

#[derive(Serialize, Debug)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize, Debug)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum WirePart<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

impl<'a> From<&'a PromptPayload> for GenerateContentRequest<'a> {
    fn from(payload: &'a PromptPayload) -> Self {
        let parts = payload
            .parts()
            .iter()
            .map(|part| match part {
                Part::Text(text) => WirePart::Text { text },
                Part::InlineImage(image) => WirePart::InlineData {
                    inline_data: InlineData {
                        mime_type: image.mime_type,
                        data: &image.data,
                    },
                },
            })
            .collect();
        Self {
            contents: [Content {
                role: "user",
                parts,
            }],
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: String,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts joined in order.
    fn into_text(self) -> Result<String, ModelError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::Blocked(reason));
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(ModelError::EmptyResponse);
        };

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err(match candidate.finish_reason {
                Some(reason) if reason != "STOP" => ModelError::Blocked(reason),
                _ => ModelError::EmptyResponse,
            });
        }
        Ok(text)
    }
}
