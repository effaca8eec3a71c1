//! Conversation-related types.

use claim_agent_model::ModelMessage;

/// Who produced a piece of the conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TranscriptSource {
    /// The system prompt.
    System,
    /// The user input.
    User,
    /// The model.
    Assistant,
    /// A tool result envelope.
    Tool,
}

/// Represents a conversation.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    pub(crate) items: Vec<Item>,
}

impl Conversation {
    /// Returns the items in the order they were added.
    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing was said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn push(&mut self, msg: ModelMessage) -> &Item {
        let (transcript, source) = match &msg {
            ModelMessage::System(text) => (text.clone(), TranscriptSource::System),
            ModelMessage::User(text) => (text.clone(), TranscriptSource::User),
            ModelMessage::Assistant(assistant) => {
                (assistant.content.clone(), TranscriptSource::Assistant)
            }
            ModelMessage::Tool(result) => {
                (result.content.clone(), TranscriptSource::Tool)
            }
        };
        self.items.push(Item {
            msg,
            transcript,
            source,
        });
        // Just pushed.
        &self.items[self.items.len() - 1]
    }

    pub(crate) fn messages(&self) -> Vec<ModelMessage> {
        self.items.iter().map(|item| item.msg.clone()).collect()
    }
}

/// An item in the conversation.
#[derive(Clone, Debug)]
pub struct Item {
    pub(crate) msg: ModelMessage,
    pub(crate) transcript: String,
    pub(crate) source: TranscriptSource,
}

impl Item {
    /// Returns the message sent to the model for this item.
    #[inline]
    pub fn message(&self) -> &ModelMessage {
        &self.msg
    }

    /// Returns the transcript of this item.
    ///
    /// The transcript is a string representation of the message item,
    /// which can be exported later. But transcript alone is not enough
    /// to reconstruct the message item, tool calls are not part of it.
    #[inline]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Returns who produced this item.
    #[inline]
    pub fn source(&self) -> TranscriptSource {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use claim_agent_model::{AssistantMessage, ToolCallResult};

    use super::*;

    #[test]
    fn test_transcripts() {
        let mut conversation = Conversation::default();
        conversation.push(ModelMessage::User("Report case 7".to_owned()));
        conversation.push(ModelMessage::Assistant(AssistantMessage {
            content: "On it.".to_owned(),
            tool_calls: vec![],
        }));
        let item = conversation.push(ModelMessage::Tool(ToolCallResult {
            id: "call:1".to_owned(),
            content: r#"{"ok":true,"data":null}"#.to_owned(),
        }));
        assert_eq!(item.source(), TranscriptSource::Tool);

        let transcripts = conversation
            .items()
            .iter()
            .map(|item| (item.source(), item.transcript()))
            .collect::<Vec<_>>();
        assert_eq!(
            transcripts,
            [
                (TranscriptSource::User, "Report case 7"),
                (TranscriptSource::Assistant, "On it."),
                (TranscriptSource::Tool, r#"{"ok":true,"data":null}"#),
            ]
        );
        assert_eq!(conversation.messages().len(), 3);
    }
}
