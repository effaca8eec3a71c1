use std::fmt::Debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_TRANSCRIPTION_MODEL: &str = "gpt-4o-transcribe";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
const DEFAULT_IMAGE_QUALITY: &str = "standard";

/// Builder for [`OpenAIConfig`].
#[derive(Clone, PartialEq)]
pub struct OpenAIConfigBuilder {
    api_key: String,
    model: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
    transcription_model: Option<String>,
    image_model: Option<String>,
    image_size: Option<String>,
    image_quality: Option<String>,
}

impl OpenAIConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            temperature: Some(DEFAULT_TEMPERATURE),
            transcription_model: None,
            image_model: None,
            image_size: None,
            image_quality: None,
        }
    }

    /// Sets the chat model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the sampling temperature of the chat model. Defaults to `0.1`.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Leaves the temperature out of requests, for models that only accept
    /// their own default.
    #[inline]
    pub fn without_temperature(mut self) -> Self {
        self.temperature = None;
        self
    }

    /// Sets the speech-to-text model.
    #[inline]
    pub fn with_transcription_model<S: Into<String>>(mut self, model: S) -> Self {
        self.transcription_model = Some(model.into());
        self
    }

    /// Sets the image generation model.
    #[inline]
    pub fn with_image_model<S: Into<String>>(mut self, model: S) -> Self {
        self.image_model = Some(model.into());
        self
    }

    /// Sets the size of generated images, like `1024x1024`.
    #[inline]
    pub fn with_image_size<S: Into<String>>(mut self, size: S) -> Self {
        self.image_size = Some(size.into());
        self
    }

    /// Sets the quality of generated images, like `standard` or `hd`.
    #[inline]
    pub fn with_image_quality<S: Into<String>>(mut self, quality: S) -> Self {
        self.image_quality = Some(quality.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OpenAIConfig {
        let or = |value: Option<String>, default: &str| {
            value.unwrap_or_else(|| default.to_owned())
        };
        OpenAIConfig {
            api_key: self.api_key,
            model: or(self.model, DEFAULT_MODEL),
            base_url: or(self.base_url, DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_owned(),
            temperature: self.temperature,
            transcription_model: or(
                self.transcription_model,
                DEFAULT_TRANSCRIPTION_MODEL,
            ),
            image_model: or(self.image_model, DEFAULT_IMAGE_MODEL),
            image_size: or(self.image_size, DEFAULT_IMAGE_SIZE),
            image_quality: or(self.image_quality, DEFAULT_IMAGE_QUALITY),
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Configuration for the OpenAI-compatible providers.
#[derive(Clone, PartialEq)]
pub struct OpenAIConfig {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) temperature: Option<f32>,
    pub(crate) transcription_model: String,
    pub(crate) image_model: String,
    pub(crate) image_size: String,
    pub(crate) image_quality: String,
}

impl OpenAIConfig {
    #[inline]
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("transcription_model", &self.transcription_model)
            .field("image_model", &self.image_model)
            .field("image_size", &self.image_size)
            .field("image_quality", &self.image_quality)
            .finish()
    }
}
