use claim_agent_core::tool::Toolbox;
use claim_agent_core::{
    Agent, AgentBuilder, AgentStage, CancelHandle, ClaimConfig,
    ClaimConfigBuilder, FinalAnswer, ImageClient, SessionFailure,
    TranscriptSource, TranscriptionClient,
};
use claim_agent_model::{ImageProvider, ModelProvider, TranscriptionProvider};
use claim_agent_openai::OpenAIProvider;

/// Instructions given to the model when no other prompt is set.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("./system_prompt.md");

type TranscriptFn = Box<dyn Fn(&str, TranscriptSource) + Send + Sync>;
type DeltaFn = Box<dyn Fn(&str) + Send + Sync>;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder<M, T, I> {
    model: M,
    transcriber: T,
    images: I,
    config: Option<ClaimConfig>,
    system_prompt: Option<String>,
    on_transcript: Option<TranscriptFn>,
    on_message_delta: Option<DeltaFn>,
}

impl SessionBuilder<OpenAIProvider, OpenAIProvider, OpenAIProvider> {
    /// Creates a session builder that uses one OpenAI-compatible provider
    /// for chat, transcription and images.
    #[inline]
    pub fn with_openai(provider: OpenAIProvider) -> Self {
        Self::with_providers(provider.clone(), provider.clone(), provider)
    }
}

impl<M, T, I> SessionBuilder<M, T, I>
where
    M: ModelProvider + 'static,
    T: TranscriptionProvider + 'static,
    I: ImageProvider + 'static,
{
    /// Creates a session builder with a provider for each service.
    #[inline]
    pub fn with_providers(model: M, transcriber: T, images: I) -> Self {
        Self {
            model,
            transcriber,
            images,
            config: None,
            system_prompt: None,
            on_transcript: None,
            on_message_delta: None,
        }
    }

    /// Sets the folders and policies. Defaults to the layout under the
    /// current directory.
    #[inline]
    pub fn with_config(mut self, config: ClaimConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces [`DEFAULT_SYSTEM_PROMPT`].
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Attaches a callback to be invoked when a transcript is generated.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str, TranscriptSource) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Box::new(on_transcript));
        self
    }

    /// Attaches a callback to be invoked for every piece of assistant text.
    #[inline]
    pub fn on_message_delta(
        mut self,
        on_message_delta: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_message_delta = Some(Box::new(on_message_delta));
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let config = self
            .config
            .unwrap_or_else(|| ClaimConfigBuilder::with_root(".").build());
        debug!("claim folders: {config:?}");

        let toolbox = Toolbox::from_config(
            &config,
            TranscriptionClient::new(self.transcriber),
            ImageClient::new(self.images),
        );
        let mut agent_builder =
            AgentBuilder::with_model_provider(self.model, toolbox)
                .with_config(&config)
                .with_system_prompt(
                    self.system_prompt
                        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_owned()),
                );
        if let Some(on_transcript) = self.on_transcript {
            agent_builder = agent_builder.on_transcript(on_transcript);
        }
        if let Some(on_message_delta) = self.on_message_delta {
            agent_builder = agent_builder.on_message_delta(on_message_delta);
        }

        Session {
            agent: agent_builder.build(),
            config,
        }
    }
}

/// A claim session: one agent working on the configured folders.
///
/// The session holds a fully configured agent that you can use directly, and
/// it is basically a wrapper around [`Agent`].
pub struct Session {
    agent: Agent,
    config: ClaimConfig,
}

impl Session {
    /// Sends an instruction and waits for the final answer.
    #[inline]
    pub async fn send_message(
        &mut self,
        message: &str,
    ) -> Result<FinalAnswer, SessionFailure> {
        self.agent.run(message).await
    }

    /// Returns a handle that cancels the session.
    #[inline]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.agent.cancel_handle()
    }

    /// Returns the current stage of the agent loop.
    #[inline]
    pub fn stage(&self) -> AgentStage {
        self.agent.stage()
    }

    /// Returns the folders and policies of the session.
    #[inline]
    pub fn config(&self) -> &ClaimConfig {
        &self.config
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}
