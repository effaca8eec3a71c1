//! Local fake providers for testing purpose.

mod media;
mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use claim_agent_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use media::*;
pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub(crate) fn new(message: &'static str, kind: ErrorKind) -> Self {
        Self { message, kind }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: Vec<PresetEvent>,
    finish_reason: ModelFinishReason,
    delay: Duration,
    event_idx: usize,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            let event_idx = this.event_idx;
            this.event_idx += 1;
            if event_idx < this.events.len() {
                let event = match &this.events[event_idx] {
                    PresetEvent::MessageDelta(msg) => {
                        ModelResponseEvent::MessageDelta(msg.clone())
                    }
                    PresetEvent::ToolCall(req) => {
                        ModelResponseEvent::ToolCall(req.clone())
                    }
                };
                return Poll::Ready(Ok(Some(event)));
            } else if event_idx == this.events.len() {
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    this.finish_reason,
                ))));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

type Responder = Arc<dyn Fn(&ModelRequest) -> PresetResponse + Send + Sync>;

#[derive(Clone)]
enum AssistantTurn {
    Preset(PresetResponse),
    Responder(Responder),
}

/// A local fake chat model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. The turn is selected by the
/// number of assistant messages already in the request, so the first request
/// of a session gets the first turn, the request after the first batch of
/// tool results gets the second one, and so on. If there are no enough turns
/// in the script, an error will be returned.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Vec<AssistantTurn>,
    delay: Option<Duration>,
    attempts: Arc<Mutex<Vec<u64>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl TestModelProvider {
    /// Appends a fixed assistant turn.
    #[inline]
    pub fn add_assistant_turn(&mut self, preset: PresetResponse) {
        self.script.push(AssistantTurn::Preset(preset));
    }

    /// Appends an assistant turn computed from the request, useful when the
    /// answer depends on earlier tool results.
    #[inline]
    pub fn add_assistant_responder<F>(&mut self, responder: F)
    where
        F: Fn(&ModelRequest) -> PresetResponse + Send + Sync + 'static,
    {
        self.script.push(AssistantTurn::Responder(Arc::new(responder)));
    }

    /// Sets the delay between two events.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, including failed attempts.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next_response(
        &self,
        req: &ModelRequest,
    ) -> Result<TestModelResponse, Error> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(req.clone());
        }

        let turn_idx = req
            .messages
            .iter()
            .filter(|msg| matches!(msg, ModelMessage::Assistant(_)))
            .count();
        let Some(turn) = self.script.get(turn_idx) else {
            return Err(Error::new("no enough turns", ErrorKind::Other));
        };
        let preset = match turn {
            AssistantTurn::Preset(preset) => preset.clone(),
            AssistantTurn::Responder(responder) => responder(req),
        };

        if let Some(failures) = preset.failures {
            let attempt = {
                let Ok(mut attempts) = self.attempts.lock() else {
                    return Err(Error::new("poisoned", ErrorKind::Other));
                };
                if attempts.len() <= turn_idx {
                    attempts.resize(turn_idx + 1, 0);
                }
                attempts[turn_idx] += 1;
                attempts[turn_idx]
            };
            if failures == 0 || attempt <= failures {
                return Err(Error::new(
                    "scripted failure",
                    ErrorKind::RateLimitExceeded,
                ));
            }
        }

        let finish_reason = if preset.has_tool_call() {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        };
        Ok(TestModelResponse {
            events: preset.events,
            finish_reason,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            event_idx: 0,
            sleep: None,
        })
    }
}

impl Debug for TestModelProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestModelProvider")
            .field("turns", &self.script.len())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        ready(self.next_response(req))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use claim_agent_model::{
        AssistantMessage, ModelTool, ToolCallRequest, ToolCallResult,
    };
    use serde_json::json;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Vec<ToolCallRequest>, ModelFinishReason) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_calls = vec![];
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .unwrap();
            match event {
                ModelResponseEvent::Completed(reason) => {
                    return (msg, tool_calls, reason);
                }
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(req) => tool_calls.push(req),
            }
        }
    }

    fn catalog() -> Vec<ModelTool> {
        vec![ModelTool {
            name: "fetchNextCase".to_owned(),
            description: "Returns the next pending case".to_owned(),
            parameters: json!({ "type": "object" }),
        }]
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_turn(PresetResponse::with_events([
            PresetEvent::MessageDelta("Sure, ".to_owned()),
            PresetEvent::MessageDelta("let me take a look.".to_owned()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call:1".to_owned(),
                name: "fetchNextCase".to_owned(),
                arguments: json!({}),
            }),
        ]));
        provider.add_assistant_turn(PresetResponse::text("Case loaded."));

        let mut req = ModelRequest {
            messages: vec![ModelMessage::User("Next case".to_owned())],
            tools: catalog(),
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_calls, reason) = collect_response(resp).await;
        assert_eq!(msg, "Sure, let me take a look.");
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].name, "fetchNextCase");
        assert_eq!(reason, ModelFinishReason::ToolCalls);

        req.messages.push(ModelMessage::Assistant(AssistantMessage {
            content: msg,
            tool_calls,
        }));
        req.messages.push(ModelMessage::Tool(ToolCallResult {
            id: "call:1".to_owned(),
            content: r#"{"ok":true,"data":null}"#.to_owned(),
        }));
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_calls, reason) = collect_response(resp).await;
        assert_eq!(msg, "Case loaded.");
        assert!(tool_calls.is_empty());
        assert_eq!(reason, ModelFinishReason::Stop);

        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_responder_sees_request() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_responder(|req| {
            PresetResponse::text(format!("{} messages", req.messages.len()))
        });

        let req = ModelRequest {
            messages: vec![
                ModelMessage::System("Be brief".to_owned()),
                ModelMessage::User("Hi".to_owned()),
            ],
            tools: vec![],
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, _, _) = collect_response(resp).await;
        assert_eq!(msg, "2 messages");
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_turn(PresetResponse::text("ok").with_failures(2));

        let req = ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            tools: vec![],
        };
        for _ in 0..2 {
            let err = provider.send_request(&req).await.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        assert!(provider.send_request(&req).await.is_ok());
    }

    #[tokio::test]
    async fn test_script_exhausted() {
        let provider = TestModelProvider::default();
        let req = ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            tools: vec![],
        };
        assert!(provider.send_request(&req).await.is_err());
    }
}
