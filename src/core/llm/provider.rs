//! Vendor-facing LLM client. The [LlmProvider] trait is the seam the
//! adapter (and tests) plug into; [HttpProvider] speaks an OpenAI-compatible
//! chat-completions API.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A file attachment already encoded for the wire.
#[derive(Debug, Clone)]
pub struct EncodedFile {
    pub mime_type: String,
    pub data_base64: String,
}

/// One single-user-turn generation: system prompt, user prompt, optional
/// sampling temperature, optional attachments.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub temperature: Option<f32>,
    pub attachments: Vec<EncodedFile>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Start a streaming generation. Chunks arrive on the returned channel
    /// in backend order; a transport failure mid-stream is delivered as a
    /// final `Err` item and closes the channel.
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<mpsc::Receiver<Result<String>>>;
}

// ── OpenAI-compatible request/response ──

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageOwned,
}

#[derive(Deserialize)]
struct ChatMessageOwned {
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

// ── HTTP provider ──

#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Full chat-completions endpoint URL.
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

pub struct HttpProvider {
    config: HttpProviderConfig,
    client: Client,
}

impl HttpProvider {
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn build_body<'a>(&'a self, request: &GenerationRequest, stream: bool) -> ChatRequest<'a> {
        let user_content = if request.attachments.is_empty() {
            MessageContent::Text(request.user.clone())
        } else {
            let mut parts = vec![ContentPart::Text {
                text: request.user.clone(),
            }];
            for file in &request.attachments {
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{}", file.mime_type, file.data_base64),
                    },
                });
            }
            MessageContent::Parts(parts)
        };

        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatRequestMessage {
                    role: "system",
                    content: MessageContent::Text(request.system.clone()),
                },
                ChatRequestMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            temperature: request.temperature,
            stream,
        }
    }

    async fn post(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(&self.config.base_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("backend API error {}: {}", status.as_u16(), detail));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    fn provider_id(&self) -> &str {
        "http"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = self.build_body(request, false);
        let response = self.post(&body).await?;
        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("backend returned no choices"))
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<mpsc::Receiver<Result<String>>> {
        let body = self.build_body(request, true);
        let response = self.post(&body).await?;

        let (tx, rx) = mpsc::channel(32);
        let mut bytes = response.bytes_stream();
        tokio::spawn(async move {
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(anyhow!("stream transport error: {e}"))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        return;
                    }
                    // Non-JSON lines (keep-alives) are skipped.
                    let Ok(parsed) = serde_json::from_str::<StreamChunk>(data) else {
                        continue;
                    };
                    let text = parsed
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                        .unwrap_or_default();
                    if !text.is_empty() && tx.send(Ok(text)).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}
