//! Shared primitives for provider-agnostic LLM transports.
//!
//! The orchestrator never talks to a vendor SDK directly.  Everything flows
//! through the [`ClientWrapper`] trait and the lightweight data types defined
//! in this module: chat messages, multimodal attachments, streaming chunks,
//! and per-call options.  The [`LlmAdapter`](crate::agentflow::adapter::LlmAdapter)
//! owns a `ClientWrapper` and is the only component that invokes it.
//!
//! # Basic request/response
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use agentflow::client_wrapper::{CallOptions, ClientWrapper, Message, Role};
//! use agentflow::clients::http::HttpClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let key = std::env::var("LLM_API_KEY")?;
//!     let client = HttpClient::new(&key, "gemini-2.0-flash");
//!
//!     let response = client
//!         .send_message(
//!             &[Message {
//!                 role: Role::User,
//!                 content: Arc::from("Who are you?"),
//!                 attachments: vec![],
//!             }],
//!             &CallOptions { temperature: 0.5 },
//!         )
//!         .await?;
//!
//!     println!("Assistant: {}", response.content);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use futures_util::stream::Stream;
use std::error::Error;
use std::pin::Pin;
use std::sync::Arc;

/// Represents the possible roles for a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// A system authored message that primes or constrains assistant behaviour.
    System,
    /// A user authored message (frequently mirror of a human end-user request).
    User,
    /// An assistant authored message (model responses).
    Assistant,
}

/// A binary payload attached to a user message for multimodal requests.
///
/// The `data` field carries the base64 encoding of the file contents; callers
/// go through [`LlmAdapter::execute_multimodal`](crate::agentflow::adapter::LlmAdapter::execute_multimodal)
/// which performs the encoding and enforces the size cap before any bytes
/// reach the transport.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// MIME type of the payload, e.g. `"image/png"`.
    pub mime_type: String,
    /// Base64-encoded file contents.
    pub data: String,
}

/// Represents a generic message to be sent to an LLM.
#[derive(Clone)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The message body.  Stored as `Arc<str>` so prompt assemblies can be
    /// cheaply cloned between the adapter and its retry loop.
    pub content: Arc<str>,
    /// Multimodal attachments.  Non-empty only on user messages built by the
    /// multimodal execution path.
    pub attachments: Vec<Attachment>,
}

/// Per-call knobs forwarded to the transport.
///
/// The adapter fills `temperature` from the mode table
/// ([`AgentMode::temperature`](crate::agentflow::mode::AgentMode::temperature));
/// transports that cannot honour it may ignore it.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Sampling temperature for this request.
    pub temperature: f32,
}

/// Represents a chunk of content in a streaming response.
/// Each chunk contains a delta (incremental piece) of the assistant's response.
#[derive(Clone, Debug)]
pub struct MessageChunk {
    /// The incremental content delta in this chunk.
    /// May be empty for chunks that don't contain content (e.g., finish_reason chunks).
    pub content: String,
    /// Optional finish reason mirroring the provider specific completion status (e.g. `"stop"`).
    pub finish_reason: Option<String>,
}

/// Type alias for a stream of message chunks compatible with `Send` executors.
pub type MessageChunkStream =
    Pin<Box<dyn Stream<Item = Result<MessageChunk, Box<dyn Error + Send + Sync>>> + Send>>;

/// Trait defining the interface to interact with various LLM services.
///
/// A [`ClientWrapper`] instance is responsible for translating requests into
/// the provider specific wire format and for returning provider responses in a
/// uniform shape.  The abstraction deliberately excludes prompt assembly,
/// retries, and rate limiting: those belong to the
/// [`LlmAdapter`](crate::agentflow::adapter::LlmAdapter).
///
/// All implementations **must** be thread-safe (`Send + Sync`) so they can be
/// shared between async tasks.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Send a full request/response style chat completion.
    ///
    /// The `messages` slice must include any system priming messages the
    /// caller wishes to send.  On success the returned [`Message`] carries the
    /// assistant content.
    async fn send_message(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<Message, Box<dyn Error + Send + Sync>>;

    /// Request a streaming response from the provider.
    ///
    /// Implementors that sit in front of providers without streaming support
    /// can inherit the default implementation which simply resolves to
    /// `Ok(None)`; the adapter then degrades to a single-chunk stream.  A
    /// `Some(MessageChunkStream)` return value must yield [`MessageChunk`]
    /// instances that mirror the incremental tokens supplied by the upstream
    /// service, in the order produced.
    async fn send_message_stream(
        &self,
        _messages: &[Message],
        _options: &CallOptions,
    ) -> Result<Option<MessageChunkStream>, Box<dyn Error + Send + Sync>> {
        Ok(None)
    }

    /// Return the identifier used to select the upstream model (e.g. `"gemini-2.0-flash"`).
    fn model_name(&self) -> &str;
}
