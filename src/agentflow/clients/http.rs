//! OpenAI-compatible HTTP transport.
//!
//! [`HttpClient`] implements [`ClientWrapper`] by posting to an
//! OpenAI-compatible `/chat/completions` endpoint with `reqwest` and parsing
//! the response field-by-field.  The default base URL targets the hosted
//! Gemini backend's compatibility surface; any provider exposing the same
//! wire format works via [`HttpClient::new_with_base_url`].
//!
//! A single shared pooled HTTP client backs every instance, keeping TLS
//! sessions and DNS lookups warm across many concurrent agents.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentflow::clients::http::HttpClient;
//!
//! let client = HttpClient::new(&std::env::var("LLM_API_KEY").unwrap(), "gemini-2.0-flash");
//!
//! // Point at a different compatible provider:
//! let other = HttpClient::new_with_base_url(
//!     "key",
//!     "model-name",
//!     "https://api.example.com/v1",
//! );
//! ```

use crate::agentflow::client_wrapper::{
    CallOptions, ClientWrapper, Message, MessageChunk, MessageChunkStream, Role,
};
use async_trait::async_trait;
use futures_util::stream::StreamExt;
use lazy_static::lazy_static;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Default base URL: the hosted Gemini backend's OpenAI-compatible surface.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

lazy_static! {
    /// Shared HTTP client with persistent connection pooling.
    ///
    /// The single client instance keeps TLS sessions and DNS lookups warm which significantly
    /// reduces latency when many concurrent requests are issued to the upstream provider.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = {
        reqwest::ClientBuilder::new()
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build shared HTTP client")
    };
}

/// Borrow the lazily initialised shared [`reqwest::Client`].
pub fn get_shared_http_client() -> &'static reqwest::Client {
    &SHARED_HTTP_CLIENT
}

/// A [`ClientWrapper`] speaking the OpenAI-compatible chat-completions wire
/// format.
pub struct HttpClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl HttpClient {
    /// Create a client against the default hosted backend.
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::new_with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Create a client against an explicit OpenAI-compatible base URL.
    pub fn new_with_base_url(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http: get_shared_http_client().clone(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Serialise messages to the OpenAI wire format.
    ///
    /// Messages with attachments become multi-part content arrays with
    /// `data:` URLs; plain messages stay simple strings.
    fn wire_messages(messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };

                if msg.attachments.is_empty() {
                    serde_json::json!({
                        "role": role,
                        "content": msg.content.as_ref()
                    })
                } else {
                    let mut parts = vec![serde_json::json!({
                        "type": "text",
                        "text": msg.content.as_ref()
                    })];
                    for attachment in &msg.attachments {
                        parts.push(serde_json::json!({
                            "type": "image_url",
                            "image_url": {
                                "url": format!(
                                    "data:{};base64,{}",
                                    attachment.mime_type, attachment.data
                                )
                            }
                        }));
                    }
                    serde_json::json!({ "role": role, "content": parts })
                }
            })
            .collect()
    }
}

#[async_trait]
impl ClientWrapper for HttpClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": Self::wire_messages(messages),
            "temperature": options.temperature,
        });

        let resp = self
            .http
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(e) })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(e) })?;

        if !status.is_success() {
            log::error!("chat completion returned HTTP {}: {}", status, text);
            return Err(format!("HTTP {} — {}", status, text).into());
        }

        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(e) })?;

        let content = parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| -> Box<dyn Error + Send + Sync> {
                "no assistant content in response".into()
            })?;

        Ok(Message {
            role: Role::Assistant,
            content: Arc::from(content),
            attachments: vec![],
        })
    }

    async fn send_message_stream(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<Option<MessageChunkStream>, Box<dyn Error + Send + Sync>> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": Self::wire_messages(messages),
            "temperature": options.temperature,
            "stream": true,
        });

        let resp = self
            .http
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(e) })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            log::error!("streaming completion returned HTTP {}: {}", status, text);
            return Err(format!("HTTP {} — {}", status, text).into());
        }

        // SSE framing: each event is a "data: {json}" line, terminated by
        // a "data: [DONE]" sentinel.  The byte stream is re-chunked through
        // a line buffer carried by `scan`.
        let chunk_stream = resp
            .bytes_stream()
            .scan(String::new(), |buffer, item| {
                let emitted: Vec<Result<MessageChunk, Box<dyn Error + Send + Sync>>> = match item
                {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        let mut out = Vec::new();
                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].trim().to_string();
                            buffer.drain(..=pos);

                            let payload = match line.strip_prefix("data:") {
                                Some(p) => p.trim(),
                                None => continue,
                            };
                            if payload == "[DONE]" || payload.is_empty() {
                                continue;
                            }

                            match serde_json::from_str::<serde_json::Value>(payload) {
                                Ok(event) => {
                                    let content = event["choices"][0]["delta"]["content"]
                                        .as_str()
                                        .unwrap_or("")
                                        .to_string();
                                    let finish_reason = event["choices"][0]["finish_reason"]
                                        .as_str()
                                        .map(|s| s.to_string());
                                    out.push(Ok(MessageChunk {
                                        content,
                                        finish_reason,
                                    }));
                                }
                                Err(err) => {
                                    out.push(Err(Box::new(err) as Box<dyn Error + Send + Sync>))
                                }
                            }
                        }
                        out
                    }
                    Err(err) => vec![Err(Box::new(err) as Box<dyn Error + Send + Sync>)],
                };
                futures_util::future::ready(Some(futures_util::stream::iter(emitted)))
            })
            .flatten();

        Ok(Some(Box::pin(chunk_stream)))
    }
}
