mod builder;
mod cancel;
mod state;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display};

use claim_agent_model::ModelMessage;
use tracing::Instrument;

use crate::case_store::CaseRecord;
use crate::config::LoopPolicy;
use crate::conversation::{Conversation, TranscriptSource};
use crate::model_client::ModelClient;
use crate::retry::{ProviderFailure, RetryPolicy};
use crate::tool::Toolbox;
use builder::{DeltaFn, TranscriptFn};
pub use builder::AgentBuilder;
pub use cancel::CancelHandle;
use cancel::CancelToken;
pub use state::AgentStage;

/// The answer of the model once it stops calling tools.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalAnswer {
    /// The text of the last assistant message.
    pub content: String,
    /// How many model requests the run took.
    pub turns: usize,
}

/// Why a session stopped without a final answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrchestrationError {
    /// The model kept calling tools for the whole turn budget.
    TurnBudgetExhausted {
        /// The budget that was used up.
        max_turns: usize,
    },
    /// The model called the same tool with the same arguments too often.
    CycleDetected {
        /// The repeated tool name.
        tool: String,
        /// The repeated arguments, in canonical form.
        arguments: String,
    },
    /// The session was cancelled through a [`CancelHandle`].
    Cancelled,
    /// The chat model kept failing.
    ModelUnavailable(ProviderFailure),
}

impl Display for OrchestrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestrationError::TurnBudgetExhausted { max_turns } => {
                write!(f, "no final answer after {max_turns} model turns")
            }
            OrchestrationError::CycleDetected { tool, arguments } => {
                write!(f, "`{tool}` was called repeatedly with {arguments}")
            }
            OrchestrationError::Cancelled => write!(f, "session cancelled"),
            OrchestrationError::ModelUnavailable(failure) => {
                write!(f, "model unavailable: {failure}")
            }
        }
    }
}

impl StdError for OrchestrationError {}

/// A failed session, with everything said until the failure.
///
/// Artifacts written before the failure are left in place.
#[derive(Clone, Debug)]
pub struct SessionFailure {
    /// What stopped the session.
    pub error: OrchestrationError,
    /// The conversation at the time of the failure.
    pub conversation: Conversation,
}

impl Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session failed: {}", self.error)
    }
}

impl StdError for SessionFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}

/// An agent instance, which maintains a session, a model provider and the
/// tools, and drives the tool-calling loop.
///
/// A session spans every [`run`](Agent::run) of the agent: the
/// conversation, the case obtained and the call history carry over, the
/// turn budget does not. Once a run fails the session is over.
pub struct Agent {
    model_client: ModelClient,
    toolbox: Toolbox,
    loop_policy: LoopPolicy,
    retry: RetryPolicy,
    conversation: Conversation,
    stage: AgentStage,
    failure: Option<OrchestrationError>,
    case: Option<CaseRecord>,
    call_counts: HashMap<(String, String), usize>,
    cancel: CancelToken,

    on_transcript: Option<TranscriptFn>,
    on_message_delta: Option<DeltaFn>,
}

impl Agent {
    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            model_client,
            toolbox,
            system_prompt,
            loop_policy,
            retry,
            on_transcript,
            on_message_delta,
        } = builder;

        let mut conversation = Conversation::default();
        if let Some(prompt) = system_prompt {
            conversation.push(ModelMessage::System(prompt));
        }

        Self {
            model_client,
            toolbox,
            loop_policy,
            retry,
            conversation,
            stage: AgentStage::default(),
            failure: None,
            case: None,
            call_counts: HashMap::new(),
            cancel: CancelToken::new(),
            on_transcript,
            on_message_delta,
        }
    }

    /// Sends `input` to the model and runs tools until the model answers
    /// without calling any.
    pub async fn run<S: Into<String>>(
        &mut self,
        input: S,
    ) -> Result<FinalAnswer, SessionFailure> {
        if let Some(error) = &self.failure {
            debug!("session already failed: {error}");
            return Err(SessionFailure {
                error: error.clone(),
                conversation: self.conversation.clone(),
            });
        }

        let span = debug_span!("agent session");
        self.add_message(ModelMessage::User(input.into()));
        let result = self.run_loop().instrument(span).await;
        result.map_err(|error| {
            warn!("session failed: {error}");
            self.stage = AgentStage::Failed;
            self.failure = Some(error.clone());
            SessionFailure {
                error,
                conversation: self.conversation.clone(),
            }
        })
    }

    /// Returns a handle that cancels this agent's session.
    #[inline]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.handle()
    }

    /// Returns the current stage of the loop.
    #[inline]
    pub fn stage(&self) -> AgentStage {
        self.stage
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the case fetched in this session, if any.
    #[inline]
    pub fn case(&self) -> Option<&CaseRecord> {
        self.case.as_ref()
    }

    fn add_message(&mut self, msg: ModelMessage) {
        let item = self.conversation.push(msg);
        if let Some(on_transcript) = &self.on_transcript {
            let source = item.source();
            if source != TranscriptSource::Assistant || !item.transcript().is_empty()
            {
                on_transcript(item.transcript(), source);
            }
        }
    }
}
