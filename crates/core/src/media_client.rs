use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use claim_agent_model::{AudioInput, ImageProvider, TranscriptionProvider};
use tracing::Instrument;

use crate::retry::ProviderFailure;

type BoxedFuture<T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderFailure>> + Send>>;
type TranscribeFn = Arc<dyn Fn(AudioInput) -> BoxedFuture<String> + Send + Sync>;
type GenerateFn = Arc<dyn Fn(&str) -> BoxedFuture<Bytes> + Send + Sync>;

/// A type-erased [`TranscriptionProvider`].
#[derive(Clone)]
pub struct TranscriptionClient {
    transcribe_fn: TranscribeFn,
}

impl TranscriptionClient {
    /// Wraps a provider.
    pub fn new<P: TranscriptionProvider + 'static>(provider: P) -> Self {
        // The provider type is erased here so that the tools and the
        // agent don't carry a generic parameter for every provider.
        let transcribe_fn: TranscribeFn = Arc::new(move |audio| {
            let file_name = audio.file_name.clone();
            let fut = provider.transcribe(audio);
            Box::pin(
                async move {
                    trace!("sending {file_name} for transcription");
                    fut.await.map_err(|err| ProviderFailure::from_provider(&err))
                }
                .instrument(trace_span!("transcription req")),
            )
        });
        Self { transcribe_fn }
    }

    /// Transcribes the audio.
    #[inline]
    pub async fn transcribe(
        &self,
        audio: AudioInput,
    ) -> Result<String, ProviderFailure> {
        (self.transcribe_fn)(audio).await
    }
}

/// A type-erased [`ImageProvider`].
#[derive(Clone)]
pub struct ImageClient {
    generate_fn: GenerateFn,
}

impl ImageClient {
    /// Wraps a provider.
    pub fn new<P: ImageProvider + 'static>(provider: P) -> Self {
        let generate_fn: GenerateFn = Arc::new(move |prompt| {
            let fut = provider.generate_image(prompt);
            Box::pin(
                async move {
                    fut.await.map_err(|err| ProviderFailure::from_provider(&err))
                }
                .instrument(trace_span!("image req")),
            )
        });
        Self { generate_fn }
    }

    /// Generates an image for the prompt.
    #[inline]
    pub async fn generate_image(
        &self,
        prompt: &str,
    ) -> Result<Bytes, ProviderFailure> {
        (self.generate_fn)(prompt).await
    }
}
