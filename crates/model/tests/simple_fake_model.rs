use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::{poll_fn, ready};
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use bytes::Bytes;
use claim_agent_model::{
    AudioInput, ErrorKind, ImageProvider, ModelFinishReason, ModelMessage,
    ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent, ModelTool, ToolCallRequest, TranscriptionProvider,
};
use serde_json::json;
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct FakeProviderError(ErrorKind);

impl Display for FakeProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeProviderError {}

impl ModelProviderError for FakeProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Calls the first advertised tool, or echoes the user otherwise.
#[derive(Debug)]
struct FakeModelResponse {
    events: VecDeque<ModelResponseEvent>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl FakeModelResponse {
    fn new(req: &ModelRequest) -> Self {
        let mut events = VecDeque::new();
        if let Some(tool) = req.tools.first() {
            events.push_back(ModelResponseEvent::ToolCall(ToolCallRequest {
                id: "call:0".to_owned(),
                name: tool.name.clone(),
                arguments: json!({}),
            }));
            events.push_back(ModelResponseEvent::Completed(
                ModelFinishReason::ToolCalls,
            ));
        } else {
            let input = req
                .messages
                .iter()
                .find_map(|msg| match msg {
                    ModelMessage::User(text) => Some(text.as_str()),
                    _ => None,
                })
                .unwrap_or("");
            for word in format!("You said {input}").split_inclusive(' ') {
                events.push_back(ModelResponseEvent::MessageDelta(
                    word.to_owned(),
                ));
            }
            events.push_back(ModelResponseEvent::Completed(
                ModelFinishReason::Stop,
            ));
        }
        Self {
            events,
            sleep: None,
        }
    }
}

impl ModelResponse for FakeModelResponse {
    type Error = FakeProviderError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.events.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_event(cx)
    }
}

struct FakeModelProvider;

impl ModelProvider for FakeModelProvider {
    type Error = FakeProviderError;
    type Response = FakeModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        if req.messages.is_empty() {
            return ready(Err(FakeProviderError(ErrorKind::Other)));
        }
        ready(Ok(FakeModelResponse::new(req)))
    }
}

struct FakeMediaProvider;

impl TranscriptionProvider for FakeMediaProvider {
    type Error = FakeProviderError;

    fn transcribe(
        &self,
        audio: AudioInput,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        if audio.data.is_empty() {
            return ready(Err(FakeProviderError(ErrorKind::InvalidResponse)));
        }
        ready(Ok(format!("{} bytes from {}", audio.data.len(), audio.file_name)))
    }
}

impl ImageProvider for FakeMediaProvider {
    type Error = FakeProviderError;

    fn generate_image(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<Bytes, Self::Error>> + Send + 'static
    {
        if prompt.contains("forbidden") {
            return ready(Err(FakeProviderError(ErrorKind::Moderated)));
        }
        ready(Ok(Bytes::from(prompt.as_bytes().to_vec())))
    }
}

async fn collect_events(
    mut resp: FakeModelResponse,
) -> Vec<ModelResponseEvent> {
    let mut events = vec![];
    loop {
        let next = poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx));
        match next.await {
            Ok(Some(event)) => events.push(event),
            Ok(None) => break,
            Err(err) => unreachable!("unexpected error: {err:?}"),
        }
    }
    events
}

#[tokio::test]
async fn test_completion() {
    let provider = FakeModelProvider;
    let req = ModelRequest {
        messages: vec![ModelMessage::User("Good morning".to_string())],
        tools: vec![],
    };
    let resp = provider.send_request(&req).await.unwrap();

    let mut message = String::new();
    for event in collect_events(resp).await {
        match event {
            ModelResponseEvent::MessageDelta(delta) => message.push_str(&delta),
            ModelResponseEvent::Completed(reason) => {
                assert_eq!(reason, ModelFinishReason::Stop);
            }
            ModelResponseEvent::ToolCall(_) => unreachable!(),
        }
    }
    assert_eq!(message, "You said Good morning");
}

#[tokio::test]
async fn test_tool_call() {
    let provider = FakeModelProvider;
    let req = ModelRequest {
        messages: vec![ModelMessage::User("Next case please".to_string())],
        tools: vec![ModelTool {
            name: "fetchNextCase".to_owned(),
            description: "Returns the next pending case.".to_owned(),
            parameters: json!({ "type": "object" }),
        }],
    };
    let resp = provider.send_request(&req).await.unwrap();
    let events = collect_events(resp).await;

    assert_eq!(events.len(), 2);
    let ModelResponseEvent::ToolCall(call) = &events[0] else {
        panic!("expected a tool call, got {:?}", events[0]);
    };
    assert_eq!(call.name, "fetchNextCase");
    assert_eq!(
        events[1],
        ModelResponseEvent::Completed(ModelFinishReason::ToolCalls)
    );
}

#[tokio::test]
async fn test_error() {
    let provider = FakeModelProvider;
    let req = ModelRequest {
        messages: vec![],
        tools: vec![],
    };
    let err = provider.send_request(&req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(err.kind().is_transient());
}

#[tokio::test]
async fn test_media_providers() {
    let provider = FakeMediaProvider;

    let text = provider
        .transcribe(AudioInput {
            file_name: "00012025.m4a".to_owned(),
            data: Bytes::from_static(b"RIFF"),
        })
        .await
        .unwrap();
    assert_eq!(text, "4 bytes from 00012025.m4a");

    let image = provider.generate_image("two cars").await.unwrap();
    assert_eq!(&image[..], b"two cars");

    let err = provider.generate_image("forbidden scene").await.unwrap_err();
    assert!(!err.kind().is_transient());
}
