//! Providers for OpenAI-compatible APIs: chat completions with tool
//! calling, audio transcription and image generation.

#[macro_use]
extern crate tracing;

mod config;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use claim_agent_model::{
    AudioInput, ErrorKind, ImageProvider, ModelProvider, ModelProviderError,
    ModelRequest, TranscriptionProvider,
};
use mime::Mime;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde_json::Value;

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use proto::{ChatCompletion, ErrorResponse, ImagesResponse, Transcription};
pub use response::OpenAIResponse;

/// Error codes the API uses when it refuses the input.
const MODERATION_CODES: &[&str] =
    &["content_policy_violation", "moderation_blocked", "content_filter"];

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_decode() {
            ErrorKind::InvalidResponse
        } else {
            ErrorKind::Other
        };
        Self::new(format!("{err}"), kind)
    }

    /// Classifies an unsuccessful HTTP answer.
    fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .map(|resp| resp.error);
        let is_moderated = detail
            .as_ref()
            .and_then(|detail| detail.code.as_ref())
            .and_then(Value::as_str)
            .is_some_and(|code| MODERATION_CODES.contains(&code));

        let kind = match status {
            StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                ErrorKind::Timeout
            }
            _ if is_moderated => ErrorKind::Moderated,
            status if status.is_client_error() => ErrorKind::Rejected,
            _ => ErrorKind::Other,
        };
        let message = match detail {
            Some(detail) => format!("{status}: {}", detail.message),
            None => format!("{status}"),
        };
        Self::new(message, kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let err = Error::from_status(status, &body);
    debug!("request failed: {err}");
    Err(err)
}

fn check_json(resp: &Response) -> Result<(), Error> {
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let is_json = content_type
        .and_then(|v| v.parse().ok())
        .map(|m: Mime| {
            m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON)
        })
        .unwrap_or(false);
    if !is_json {
        return Err(Error::new(
            format!("Unexpected content type: {content_type:?}"),
            ErrorKind::InvalidResponse,
        ));
    }
    Ok(())
}

async fn send_json(req: RequestBuilder) -> Result<Response, Error> {
    let resp = req.send().await.map_err(Error::from_reqwest)?;
    let resp = check_status(resp).await?;
    check_json(&resp)?;
    Ok(resp)
}

/// OpenAI-compatible provider for chat, transcription and images.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.config.endpoint(path)).header(
            header::AUTHORIZATION,
            format!("Bearer {}", self.config.api_key),
        )
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let req = self
            .post("/chat/completions")
            .header(header::ACCEPT, "application/json")
            .json(&openai_req);

        async move {
            let resp = send_json(req).await?;
            let completion: ChatCompletion =
                resp.json().await.map_err(Error::from_reqwest)?;
            OpenAIResponse::from_completion(completion)
        }
    }
}

impl TranscriptionProvider for OpenAIProvider {
    type Error = Error;

    fn transcribe(
        &self,
        audio: AudioInput,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static {
        trace!("transcribing {} ({} bytes)", audio.file_name, audio.data.len());
        let part = Part::bytes(audio.data.to_vec()).file_name(audio.file_name);
        let form = Form::new()
            .text("model", self.config.transcription_model.clone())
            .text("response_format", "json")
            .part("file", part);
        let req = self.post("/audio/transcriptions").multipart(form);

        async move {
            let resp = send_json(req).await?;
            let transcription: Transcription =
                resp.json().await.map_err(Error::from_reqwest)?;
            Ok(transcription.text)
        }
    }
}

impl ImageProvider for OpenAIProvider {
    type Error = Error;

    fn generate_image(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<Bytes, Self::Error>> + Send + 'static {
        let req = self
            .post("/images/generations")
            .json(&proto::create_image_request(prompt, &self.config));
        let client = self.client.clone();

        async move {
            let resp = send_json(req).await?;
            let images: ImagesResponse =
                resp.json().await.map_err(Error::from_reqwest)?;
            let Some(image) = images.data.into_iter().next() else {
                return Err(Error::new(
                    "no image in response",
                    ErrorKind::InvalidResponse,
                ));
            };

            if let Some(data) = image.b64_json {
                return BASE64.decode(&data).map(Bytes::from).map_err(|err| {
                    Error::new(
                        format!("inline image is not valid base64: {err}"),
                        ErrorKind::InvalidResponse,
                    )
                });
            }
            let Some(url) = image.url else {
                return Err(Error::new(
                    "image has neither a URL nor inline data",
                    ErrorKind::InvalidResponse,
                ));
            };
            debug!("downloading generated image");
            let resp = client.get(url).send().await.map_err(Error::from_reqwest)?;
            let resp = check_status(resp).await?;
            resp.bytes().await.map_err(Error::from_reqwest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_status() {
        let err = Error::from_status(StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(err.message(), "429 Too Many Requests");

        let err = Error::from_status(StatusCode::GATEWAY_TIMEOUT, "<html>");
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let body = r#"{
            "error": {
                "message": "Your request was rejected by the safety system.",
                "type": "invalid_request_error",
                "code": "content_policy_violation"
            }
        }"#;
        let err = Error::from_status(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.kind(), ErrorKind::Moderated);
        assert!(err.message().contains("safety system"));

        let body = r#"{"error":{"message":"boom","type":null,"code":500}}"#;
        let err = Error::from_status(StatusCode::INTERNAL_SERVER_ERROR, body);
        assert_eq!(err.kind(), ErrorKind::Other);
        assert!(err.kind().is_transient());

        let err = Error::from_status(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let body = r#"{
            "error": {
                "message": "Incorrect API key provided.",
                "type": "invalid_request_error",
                "code": "invalid_api_key"
            }
        }"#;
        let err = Error::from_status(StatusCode::UNAUTHORIZED, body);
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert!(!err.kind().is_transient());
        assert!(err.message().contains("Incorrect API key"));

        let body = r#"{
            "error": {
                "message": "Invalid value for 'size'.",
                "type": "invalid_request_error",
                "code": "invalid_value"
            }
        }"#;
        let err = Error::from_status(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert!(!err.kind().is_transient());

        for status in [StatusCode::FORBIDDEN, StatusCode::NOT_FOUND] {
            let err = Error::from_status(status, "");
            assert_eq!(err.kind(), ErrorKind::Rejected);
        }
    }

    #[test]
    fn test_decode_inline_image() {
        let data = BASE64.decode("iVBORw0KGgo=").unwrap();
        assert_eq!(data, b"\x89PNG\r\n\x1a\n");
        assert!(BASE64.decode("Zm9v!").is_err());
    }
}
