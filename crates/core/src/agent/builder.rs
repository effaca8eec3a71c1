use std::sync::Arc;

use claim_agent_model::ModelProvider;

use super::Agent;
use crate::config::{ClaimConfig, LoopPolicy};
use crate::conversation::TranscriptSource;
use crate::model_client::ModelClient;
use crate::retry::RetryPolicy;
use crate::tool::Toolbox;

pub(crate) type TranscriptFn = Box<dyn Fn(&str, TranscriptSource) + Send + Sync>;
pub(crate) type DeltaFn = Arc<dyn Fn(&str) + Send + Sync>;

/// [`Agent`] builder.
pub struct AgentBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) toolbox: Toolbox,
    pub(crate) system_prompt: Option<String>,
    pub(crate) loop_policy: LoopPolicy,
    pub(crate) retry: RetryPolicy,
    pub(crate) on_transcript: Option<TranscriptFn>,
    pub(crate) on_message_delta: Option<DeltaFn>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider and the
    /// tools the model may call.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
        toolbox: Toolbox,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            toolbox,
            system_prompt: None,
            loop_policy: LoopPolicy::default(),
            retry: RetryPolicy::default(),
            on_transcript: None,
            on_message_delta: None,
        }
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the bounds of the tool-calling loop.
    #[inline]
    pub fn with_loop_policy(mut self, loop_policy: LoopPolicy) -> Self {
        self.loop_policy = loop_policy;
        self
    }

    /// Sets the retry schedule of model requests.
    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Takes the loop bounds and the retry schedule from `config`.
    #[inline]
    pub fn with_config(self, config: &ClaimConfig) -> Self {
        self.with_loop_policy(config.loop_policy)
            .with_retry_policy(config.retry.clone())
    }

    /// Attaches a callback to be invoked when a conversation item is added.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str, TranscriptSource) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Box::new(on_transcript));
        self
    }

    /// Attaches a callback to be invoked for every piece of assistant text
    /// as it streams in.
    #[inline]
    pub fn on_message_delta(
        mut self,
        on_message_delta: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_message_delta = Some(Arc::new(on_message_delta));
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent::from_builder(self)
    }
}
