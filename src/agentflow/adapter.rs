//! Narrow façade over the LLM transport.
//!
//! [`LlmAdapter`] is the only component that invokes a
//! [`ClientWrapper`](crate::agentflow::client_wrapper::ClientWrapper).  It
//! owns the two sliding-window rate limiters (per-minute and per-day),
//! translates a `(prompt, mode)` pair into a system-plus-user request with
//! the mode's temperature, retries rate-limited failures with exponential
//! backoff, and wraps every other transport failure in [`LlmError`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentflow::adapter::{AdapterConfig, LlmAdapter};
//! use agentflow::clients::http::HttpClient;
//! use agentflow::mode::AgentMode;
//!
//! # async {
//! let client = Arc::new(HttpClient::new("api-key", "gemini-2.0-flash"));
//! let adapter = LlmAdapter::new(client, AdapterConfig::default());
//!
//! if adapter.check_health().await {
//!     let answer = adapter.execute("Summarize this design", AgentMode::Architect).await?;
//!     println!("{}", answer);
//! }
//! # Ok::<(), agentflow::adapter::LlmError>(())
//! # };
//! ```

use crate::agentflow::client_wrapper::{
    Attachment, CallOptions, ClientWrapper, Message, Role,
};
use crate::agentflow::mode::AgentMode;
use crate::agentflow::rate_limiter::{
    is_rate_limit_error, RateLimitStatus, RateLimiter, RateLimiterConfig,
};
use crate::agentflow::task::TaskFile;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::stream::{Stream, StreamExt};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Largest accepted attachment, in bytes (10 MiB).
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for an [`LlmAdapter`].
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Per-minute rate-limit window.
    pub minute: RateLimiterConfig,
    /// Per-day rate-limit window.
    pub day: RateLimiterConfig,
    /// Attachment size cap enforced before any multimodal call.
    pub max_file_bytes: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            minute: RateLimiterConfig::per_minute(),
            day: RateLimiterConfig::per_day(),
            max_file_bytes: MAX_FILE_BYTES,
        }
    }
}

/// Adapter-level failures.
#[derive(Debug)]
pub enum LlmError {
    /// The remote call or response parse failed; carries the rendered cause.
    Execution(String),
    /// A streaming response failed mid-flight.
    Stream(String),
    /// An attachment exceeded the size cap; rejected before any call.
    FileTooLarge {
        /// Observed attachment size in bytes.
        size: usize,
        /// Configured cap in bytes.
        cap: usize,
    },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Execution(msg) => write!(f, "LLM execution failed: {}", msg),
            LlmError::Stream(msg) => write!(f, "LLM stream failed: {}", msg),
            LlmError::FileTooLarge { size, cap } => {
                write!(f, "Attachment of {} bytes exceeds the {} byte cap", size, cap)
            }
        }
    }
}

impl Error for LlmError {}

/// A lazy, finite, non-restartable sequence of response text chunks.
pub type TextChunkStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Rate-limited, retrying façade over a [`ClientWrapper`].
pub struct LlmAdapter {
    client: Arc<dyn ClientWrapper>,
    minute_limiter: RateLimiter,
    day_limiter: RateLimiter,
    max_file_bytes: usize,
}

impl LlmAdapter {
    /// Create an adapter around a transport.
    pub fn new(client: Arc<dyn ClientWrapper>, config: AdapterConfig) -> Self {
        Self {
            client,
            minute_limiter: RateLimiter::new(config.minute),
            day_limiter: RateLimiter::new(config.day),
            max_file_bytes: config.max_file_bytes,
        }
    }

    /// Single-shot execution: one user turn under the mode's system prompt
    /// and temperature.  Returns the assembled response text.
    pub async fn execute(&self, prompt: &str, mode: AgentMode) -> Result<String, LlmError> {
        let messages = build_messages(prompt, mode, Vec::new());
        let options = CallOptions {
            temperature: mode.temperature(),
        };

        let client = Arc::clone(&self.client);
        let reply = self
            .guarded_call(move || {
                let client = Arc::clone(&client);
                let messages = messages.clone();
                let options = options.clone();
                async move { client.send_message(&messages, &options).await }
            })
            .await
            .map_err(|e| LlmError::Execution(e.to_string()))?;

        Ok(reply.content.as_ref().to_string())
    }

    /// Like [`execute`](LlmAdapter::execute), with file attachments encoded
    /// as `(mime_type, base64(data))`.  Oversized files are rejected before
    /// the call.
    pub async fn execute_multimodal(
        &self,
        prompt: &str,
        files: &[TaskFile],
        mode: AgentMode,
    ) -> Result<String, LlmError> {
        let mut attachments = Vec::with_capacity(files.len());
        for file in files {
            if file.data.len() > self.max_file_bytes {
                return Err(LlmError::FileTooLarge {
                    size: file.data.len(),
                    cap: self.max_file_bytes,
                });
            }
            attachments.push(Attachment {
                mime_type: file.mime_type.clone(),
                data: BASE64.encode(&file.data),
            });
        }

        let messages = build_messages(prompt, mode, attachments);
        let options = CallOptions {
            temperature: mode.temperature(),
        };

        let client = Arc::clone(&self.client);
        let reply = self
            .guarded_call(move || {
                let client = Arc::clone(&client);
                let messages = messages.clone();
                let options = options.clone();
                async move { client.send_message(&messages, &options).await }
            })
            .await
            .map_err(|e| LlmError::Execution(e.to_string()))?;

        Ok(reply.content.as_ref().to_string())
    }

    /// Streaming execution.
    ///
    /// Emits text chunks in backend order and ends when the backend ends; a
    /// backend failure terminates the sequence with an [`LlmError::Stream`]
    /// item.  The stream is not restartable.  Transports without streaming
    /// support degrade to a single-chunk stream via the one-shot path.
    pub async fn stream_execute(
        &self,
        prompt: &str,
        mode: AgentMode,
    ) -> Result<TextChunkStream, LlmError> {
        let messages = build_messages(prompt, mode, Vec::new());
        let options = CallOptions {
            temperature: mode.temperature(),
        };

        let client = Arc::clone(&self.client);
        let opened = {
            let messages = messages.clone();
            let options = options.clone();
            self.guarded_call(move || {
                let client = Arc::clone(&client);
                let messages = messages.clone();
                let options = options.clone();
                async move { client.send_message_stream(&messages, &options).await }
            })
            .await
            .map_err(|e| LlmError::Stream(e.to_string()))?
        };

        match opened {
            Some(chunks) => Ok(Box::pin(chunks.map(|item| match item {
                Ok(chunk) => Ok(chunk.content),
                Err(err) => Err(LlmError::Stream(err.to_string())),
            }))),
            None => {
                // Transport has no streaming path; collapse to one chunk.
                let text = self.execute(prompt, mode).await?;
                Ok(Box::pin(futures_util::stream::iter(vec![Ok(text)])))
            }
        }
    }

    /// Minimal round-trip health probe.  True iff a non-empty response
    /// arrived without error.  Never raises.
    ///
    /// Unlike the execution methods, the probe bypasses both rate limiters:
    /// it must not consume slots budgeted for real executions, and it must
    /// answer promptly even when the windows are saturated.
    pub async fn check_health(&self) -> bool {
        let messages = vec![Message {
            role: Role::User,
            content: Arc::from("Reply with OK."),
            attachments: vec![],
        }];
        let options = CallOptions { temperature: 0.0 };

        match self.client.send_message(&messages, &options).await {
            Ok(reply) => !reply.content.trim().is_empty(),
            Err(err) => {
                log::warn!("LLM health check failed: {}", err);
                false
            }
        }
    }

    /// Snapshots of the per-minute and per-day windows, in that order.
    pub async fn rate_limit_status(&self) -> (RateLimitStatus, RateLimitStatus) {
        (
            self.minute_limiter.status().await,
            self.day_limiter.status().await,
        )
    }

    /// Run a transport call behind both limiters, retrying rate-limited
    /// failures with exponential backoff.  Non-rate-limit failures propagate
    /// on first occurrence.
    async fn guarded_call<T, F, Fut>(&self, mut f: F) -> Result<T, Box<dyn Error + Send + Sync>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Box<dyn Error + Send + Sync>>> + Send,
    {
        let policy = self.minute_limiter.config().clone();
        let attempts = policy.max_retries.max(1);

        for attempt in 0..attempts {
            self.minute_limiter.check_and_register().await;
            self.day_limiter.check_and_register().await;

            match f().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let retryable = is_rate_limit_error(&err.to_string());
                    if !retryable || attempt + 1 == attempts {
                        return Err(err);
                    }
                    let backoff = policy.retry_delay * 2u32.pow(attempt);
                    log::warn!(
                        "LLM call rate-limited (attempt {}/{}), backing off {:?}",
                        attempt + 1,
                        attempts,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        unreachable!("loop always returns before exhausting attempts")
    }
}

/// Assemble the system + user message pair for a call.
fn build_messages(prompt: &str, mode: AgentMode, attachments: Vec<Attachment>) -> Vec<Message> {
    vec![
        Message {
            role: Role::System,
            content: Arc::from(mode.system_prompt()),
            attachments: vec![],
        },
        Message {
            role: Role::User,
            content: Arc::from(prompt),
            attachments,
        },
    ]
}
