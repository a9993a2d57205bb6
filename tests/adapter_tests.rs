use agentflow::adapter::{AdapterConfig, LlmAdapter, LlmError, MAX_FILE_BYTES};
use agentflow::client_wrapper::{
    CallOptions, ClientWrapper, Message, MessageChunk, MessageChunkStream, Role,
};
use agentflow::mode::AgentMode;
use agentflow::rate_limiter::RateLimiterConfig;
use agentflow::task::TaskFile;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::StreamExt;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Records every request and replies with a fixed response, optionally
/// failing the first `fail_first` calls with `fail_message`.
struct MockClient {
    response: String,
    fail_first: usize,
    fail_message: String,
    calls: AtomicUsize,
    seen: Mutex<Vec<(Vec<Message>, CallOptions)>>,
}

impl MockClient {
    fn replying(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fail_first: 0,
            fail_message: String::new(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn failing_first(n: usize, message: &str, response: &str) -> Self {
        Self {
            fail_first: n,
            fail_message: message.to_string(),
            ..Self::replying(response)
        }
    }
}

#[async_trait]
impl ClientWrapper for MockClient {
    async fn send_message(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .await
            .push((messages.to_vec(), options.clone()));

        if n < self.fail_first {
            return Err(self.fail_message.clone().into());
        }
        Ok(Message {
            role: Role::Assistant,
            content: Arc::from(self.response.as_str()),
            attachments: vec![],
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

fn fast_retry_config() -> AdapterConfig {
    AdapterConfig {
        minute: RateLimiterConfig {
            max_requests: 1_000,
            window: Duration::from_millis(60_000),
            max_retries: 3,
            retry_delay: Duration::from_millis(10),
        },
        day: RateLimiterConfig {
            max_requests: 10_000,
            window: Duration::from_millis(86_400_000),
            max_retries: 3,
            retry_delay: Duration::from_millis(10),
        },
        ..AdapterConfig::default()
    }
}

#[tokio::test]
async fn execute_returns_the_assembled_text() {
    let client = Arc::new(MockClient::replying("the answer"));
    let adapter = LlmAdapter::new(Arc::clone(&client) as Arc<dyn ClientWrapper>, fast_retry_config());

    let text = adapter.execute("question", AgentMode::Ask).await.unwrap();
    assert_eq!(text, "the answer");
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn execute_sends_mode_system_prompt_and_temperature() {
    let client = Arc::new(MockClient::replying("ok"));
    let adapter = LlmAdapter::new(Arc::clone(&client) as Arc<dyn ClientWrapper>, fast_retry_config());

    adapter.execute("find the bug", AgentMode::Debugger).await.unwrap();

    let seen = client.seen.lock().await;
    let (messages, options) = &seen[0];
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[0].content.as_ref(), AgentMode::Debugger.system_prompt());
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].content.as_ref(), "find the bug");
    assert!((options.temperature - 0.1).abs() < f32::EPSILON);
}

#[tokio::test]
async fn execute_wraps_transport_failures() {
    let client = Arc::new(MockClient::failing_first(usize::MAX, "socket closed", ""));
    let adapter = LlmAdapter::new(client as Arc<dyn ClientWrapper>, fast_retry_config());

    let err = adapter.execute("q", AgentMode::Ask).await.unwrap_err();
    match err {
        LlmError::Execution(msg) => assert!(msg.contains("socket closed")),
        other => panic!("expected execution error, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limited_calls_are_retried() {
    let client = Arc::new(MockClient::failing_first(1, "HTTP 429 too many requests", "recovered"));
    let adapter = LlmAdapter::new(Arc::clone(&client) as Arc<dyn ClientWrapper>, fast_retry_config());

    let text = adapter.execute("q", AgentMode::Ask).await.unwrap();
    assert_eq!(text, "recovered");
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_as_execution_error() {
    let client = Arc::new(MockClient::failing_first(usize::MAX, "quota exceeded", ""));
    let adapter = LlmAdapter::new(Arc::clone(&client) as Arc<dyn ClientWrapper>, fast_retry_config());

    let err = adapter.execute("q", AgentMode::Ask).await.unwrap_err();
    assert!(matches!(err, LlmError::Execution(_)));
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn multimodal_attaches_base64_payloads() {
    let client = Arc::new(MockClient::replying("described"));
    let adapter = LlmAdapter::new(Arc::clone(&client) as Arc<dyn ClientWrapper>, fast_retry_config());

    let files = vec![TaskFile {
        mime_type: "image/png".into(),
        data: vec![1, 2, 3, 4],
    }];
    adapter
        .execute_multimodal("what is this", &files, AgentMode::Designer)
        .await
        .unwrap();

    let seen = client.seen.lock().await;
    let (messages, _) = &seen[0];
    let attachment = &messages[1].attachments[0];
    assert_eq!(attachment.mime_type, "image/png");
    assert_eq!(attachment.data, BASE64.encode([1u8, 2, 3, 4]));
}

#[tokio::test]
async fn file_at_the_cap_passes_one_byte_over_rejects() {
    let client = Arc::new(MockClient::replying("ok"));
    let adapter = LlmAdapter::new(Arc::clone(&client) as Arc<dyn ClientWrapper>, fast_retry_config());

    let at_cap = vec![TaskFile {
        mime_type: "application/octet-stream".into(),
        data: vec![0u8; MAX_FILE_BYTES],
    }];
    assert!(adapter
        .execute_multimodal("p", &at_cap, AgentMode::Ask)
        .await
        .is_ok());

    let over_cap = vec![TaskFile {
        mime_type: "application/octet-stream".into(),
        data: vec![0u8; MAX_FILE_BYTES + 1],
    }];
    let calls_before = client.calls.load(Ordering::SeqCst);
    let err = adapter
        .execute_multimodal("p", &over_cap, AgentMode::Ask)
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::FileTooLarge { .. }));
    // Rejected before any transport call was made.
    assert_eq!(client.calls.load(Ordering::SeqCst), calls_before);
}

#[tokio::test]
async fn check_health_is_true_on_non_empty_reply() {
    let healthy = Arc::new(MockClient::replying("OK"));
    let adapter = LlmAdapter::new(healthy as Arc<dyn ClientWrapper>, fast_retry_config());
    assert!(adapter.check_health().await);

    let silent = Arc::new(MockClient::replying("   "));
    let adapter = LlmAdapter::new(silent as Arc<dyn ClientWrapper>, fast_retry_config());
    assert!(!adapter.check_health().await);

    let broken = Arc::new(MockClient::failing_first(usize::MAX, "connection refused", ""));
    let adapter = LlmAdapter::new(broken as Arc<dyn ClientWrapper>, fast_retry_config());
    assert!(!adapter.check_health().await);
}

#[tokio::test(start_paused = true)]
async fn check_health_bypasses_the_rate_limiters() {
    let client = Arc::new(MockClient::replying("OK"));
    let config = AdapterConfig {
        minute: RateLimiterConfig {
            max_requests: 2,
            window: Duration::from_millis(60_000),
            max_retries: 3,
            retry_delay: Duration::from_millis(10),
        },
        ..fast_retry_config()
    };
    let adapter = LlmAdapter::new(Arc::clone(&client) as Arc<dyn ClientWrapper>, config);

    // Saturate the per-minute window.
    adapter.execute("q1", AgentMode::Ask).await.unwrap();
    adapter.execute("q2", AgentMode::Ask).await.unwrap();
    let (minute_before, day_before) = adapter.rate_limit_status().await;
    assert_eq!(minute_before.current, minute_before.limit);

    // The probe answers promptly despite the full window and still reaches
    // the backend.
    let probe_start = tokio::time::Instant::now();
    assert!(adapter.check_health().await);
    assert!(probe_start.elapsed() < Duration::from_millis(100));
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);

    // Neither window spent a slot on it.
    let (minute_after, day_after) = adapter.rate_limit_status().await;
    assert_eq!(minute_after.current, minute_before.current);
    assert_eq!(day_after.current, day_before.current);
}

#[tokio::test]
async fn rate_limit_status_reflects_registered_calls() {
    let client = Arc::new(MockClient::replying("ok"));
    let adapter = LlmAdapter::new(client as Arc<dyn ClientWrapper>, AdapterConfig::default());

    let (minute, day) = adapter.rate_limit_status().await;
    assert_eq!((minute.current, minute.limit), (0, 60));
    assert_eq!((day.current, day.limit), (0, 1_000));

    adapter.execute("q", AgentMode::Ask).await.unwrap();

    let (minute, day) = adapter.rate_limit_status().await;
    assert_eq!(minute.current, 1);
    assert_eq!(day.current, 1);
}

/// Streaming mock: yields fixed chunks, then optionally an error.
struct StreamingClient {
    chunks: Vec<String>,
    trailing_error: Option<String>,
}

#[async_trait]
impl ClientWrapper for StreamingClient {
    async fn send_message(
        &self,
        _messages: &[Message],
        _options: &CallOptions,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        Ok(Message {
            role: Role::Assistant,
            content: Arc::from(self.chunks.concat().as_str()),
            attachments: vec![],
        })
    }

    async fn send_message_stream(
        &self,
        _messages: &[Message],
        _options: &CallOptions,
    ) -> Result<Option<MessageChunkStream>, Box<dyn Error + Send + Sync>> {
        let mut items: Vec<Result<MessageChunk, Box<dyn Error + Send + Sync>>> = self
            .chunks
            .iter()
            .map(|c| {
                Ok(MessageChunk {
                    content: c.clone(),
                    finish_reason: None,
                })
            })
            .collect();
        if let Some(err) = &self.trailing_error {
            items.push(Err(err.clone().into()));
        }
        Ok(Some(Box::pin(futures_util::stream::iter(items))))
    }

    fn model_name(&self) -> &str {
        "streaming-mock"
    }
}

#[tokio::test]
async fn stream_execute_yields_chunks_in_order() {
    let client = Arc::new(StreamingClient {
        chunks: vec!["Hel".into(), "lo ".into(), "world".into()],
        trailing_error: None,
    });
    let adapter = LlmAdapter::new(client as Arc<dyn ClientWrapper>, fast_retry_config());

    let mut stream = adapter.stream_execute("q", AgentMode::Ask).await.unwrap();
    let mut collected = String::new();
    while let Some(chunk) = stream.next().await {
        collected.push_str(&chunk.unwrap());
    }
    assert_eq!(collected, "Hello world");
}

#[tokio::test]
async fn stream_errors_terminate_the_sequence() {
    let client = Arc::new(StreamingClient {
        chunks: vec!["partial".into()],
        trailing_error: Some("backend dropped the stream".into()),
    });
    let adapter = LlmAdapter::new(client as Arc<dyn ClientWrapper>, fast_retry_config());

    let mut stream = adapter.stream_execute("q", AgentMode::Ask).await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap(), "partial");

    let failure = stream.next().await.unwrap();
    assert!(matches!(failure, Err(LlmError::Stream(_))));
}

#[tokio::test]
async fn stream_execute_degrades_to_a_single_chunk_without_transport_support() {
    let client = Arc::new(MockClient::replying("whole response"));
    let adapter = LlmAdapter::new(client as Arc<dyn ClientWrapper>, fast_retry_config());

    let mut stream = adapter.stream_execute("q", AgentMode::Ask).await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap(), "whole response");
    assert!(stream.next().await.is_none());
}
