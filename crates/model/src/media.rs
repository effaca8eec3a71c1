use bytes::Bytes;

use crate::provider::ModelProviderError;

/// An audio asset handed to a transcription provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AudioInput {
    /// The original file name. Providers usually sniff the audio
    /// format from its extension.
    pub file_name: String,
    /// Raw audio bytes.
    pub data: Bytes,
}

/// A speech-to-text provider.
pub trait TranscriptionProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Transcribes the audio into plain text.
    fn transcribe(
        &self,
        audio: AudioInput,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static;
}

/// An image generation provider.
pub trait ImageProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    ///
    /// Errors of kind [`crate::ErrorKind::Moderated`] mean the prompt
    /// was rejected and should not be sent again.
    type Error: ModelProviderError;

    /// Generates one image for the prompt and returns its encoded bytes.
    ///
    /// Providers that answer with a URL are expected to download the
    /// image before resolving.
    fn generate_image(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<Bytes, Self::Error>> + Send + 'static;
}
