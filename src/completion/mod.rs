use crate::config::{Config, ModelConfig};
use crate::conversation::Turn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const VISION_DEFAULT_PROMPT: &str = "What is in this image?";

#[derive(Serialize, Debug)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

impl Message {
    pub fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: MessageContent::Text(content.into()),
        }
    }
}

#[derive(Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion API returned status {0}")]
    Status(u16),
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion response was not understood: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("completion response had no choices")]
    NoChoices,
    #[error("GROQ_API_KEY is not set")]
    MissingKey,
}

/// Client for an OpenAI-compatible chat completions endpoint (Groq by default).
#[derive(Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    models: ModelConfig,
}

impl CompletionClient {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.credentials.groq_api_key.clone(),
            base_url: config.settings.endpoints.groq.trim_end_matches('/').to_string(),
            models: config.settings.models.clone(),
        }
    }

    /// Messages for a text completion: system prompt, stored history, new user turn.
    pub fn build_messages(system_prompt: &str, history: &[Turn], user_message: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::text("system", system_prompt));
        messages.extend(
            history
                .iter()
                .map(|turn| Message::text(turn.role().as_str(), turn.content())),
        );
        messages.push(Message::text("user", user_message));
        messages
    }

    /// Text completion. Failures come back as a short reply text.
    pub async fn chat(&self, system_prompt: &str, history: &[Turn], user_message: &str) -> String {
        let request = CompletionRequest {
            model: self.models.chat.clone(),
            messages: Self::build_messages(system_prompt, history, user_message),
            temperature: 0.6,
            max_completion_tokens: None,
        };

        match self.complete(&request).await {
            Ok(text) => text,
            Err(CompletionError::Status(code)) => format!("Brain Error {}", code),
            Err(e) => {
                tracing::error!(error = %e, "chat completion failed");
                "AI Error.".to_string()
            }
        }
    }

    /// Vision completion over one image, with an optional question about it.
    pub async fn describe_image(&self, text: Option<&str>, image: &str) -> String {
        let prompt = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(VISION_DEFAULT_PROMPT);

        let request = CompletionRequest {
            model: self.models.vision.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_data_url(image),
                        },
                    },
                ]),
            }],
            temperature: 0.6,
            max_completion_tokens: Some(1024),
        };

        match self.complete(&request).await {
            Ok(text) => text,
            Err(CompletionError::Status(code)) => format!("Vision Error: {}", code),
            Err(e) => {
                tracing::error!(error = %e, "image description failed");
                "Failed to analyze image.".to_string()
            }
        }
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let api_key = self.api_key.as_deref().ok_or(CompletionError::MissingKey)?;
        let endpoint = format!("{}/chat/completions", self.base_url);

        tracing::debug!(
            endpoint = %endpoint,
            model = %request.model,
            messages = request.messages.len(),
            "sending completion request"
        );

        let raw_response = self
            .client
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = raw_response.status();
        let response_text = raw_response.text().await?;
        let preview: String = response_text.chars().take(80).collect();
        tracing::debug!("Raw API response: {}", preview);

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), body = %preview, "completion API error");
            return Err(CompletionError::Status(status.as_u16()));
        }

        let response: CompletionResponse = serde_json::from_str(&response_text)?;
        let choice = response.choices.into_iter().next().ok_or(CompletionError::NoChoices)?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

/// The front end sends data URLs; bare base64 is assumed to be a JPEG.
fn image_data_url(image: &str) -> String {
    let image = image.trim();
    if image.starts_with("data:") || image.starts_with("http://") || image.starts_with("https://") {
        image.to_string()
    } else {
        format!("data:image/jpeg;base64,{}", image)
    }
}
