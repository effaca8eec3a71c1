use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use claim_agent_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};

use crate::Error;
use crate::proto::{ChatCompletion, decode_tool_call};

/// A chat completion received in one piece, replayed as events.
pub struct OpenAIResponse {
    events: VecDeque<ModelResponseEvent>,
}

impl OpenAIResponse {
    pub fn from_completion(completion: ChatCompletion) -> Result<Self, Error> {
        trace!("got completion {}", completion.id);
        let Some(choice) = completion.choices.into_iter().next() else {
            return Err(Error::new(
                "completion has no choices",
                ErrorKind::InvalidResponse,
            ));
        };
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(Error::new(
                "completion was stopped by the content filter",
                ErrorKind::Moderated,
            ));
        }

        let message = choice.message;
        let has_tool_calls = !message.tool_calls.is_empty();

        // The order of events is important. Always emit the text first, then
        // the tool calls, and finally the finish reason.
        let mut events = VecDeque::with_capacity(message.tool_calls.len() + 2);
        if let Some(content) = message.content.or(message.refusal) {
            if !content.is_empty() {
                events.push_back(ModelResponseEvent::MessageDelta(content));
            }
        }
        events.extend(
            message
                .tool_calls
                .into_iter()
                .map(decode_tool_call)
                .map(ModelResponseEvent::ToolCall),
        );
        let finish_reason = if has_tool_calls {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        };
        events.push_back(ModelResponseEvent::Completed(finish_reason));

        Ok(Self { events })
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        Poll::Ready(Ok(self.get_mut().events.pop_front()))
    }
}
