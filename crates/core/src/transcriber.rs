use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use claim_agent_model::{AudioInput, ErrorKind as ProviderErrorKind};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::spawn_blocking;

use crate::case_store::validate_case_id;
use crate::fs::{Existing, write_atomic};
use crate::media_client::TranscriptionClient;
use crate::retry::{ProviderFailure, RetryPolicy, with_retry};
use crate::tool::{Error as ToolError, Tool, ToolKind, ToolResult};

/// Extensions accepted as interview audio.
const AUDIO_EXTENSIONS: &[&str] = &[
    "flac", "m4a", "mp3", "mp4", "mpeg", "mpga", "oga", "ogg", "wav", "webm",
];

/// The interview transcript of a case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    /// The case the transcript belongs to.
    pub case_id: String,
    /// The transcribed text.
    pub text: String,
    /// Whether the text came from the cache.
    pub cached: bool,
}

/// Arguments of `resolveTranscript`.
#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveTranscriptParameters {
    #[schemars(description = "Id of the case whose interview is needed.")]
    case_id: String,
}

/// Resolves interview audio to text, caching one transcript per case.
///
/// The cache is a folder of `{case id}.txt` files. A cached transcript is
/// returned without calling the provider, so each case is transcribed at
/// most once as long as the cache folder is kept.
pub struct InterviewTranscriber {
    interview_dir: PathBuf,
    cache_dir: PathBuf,
    client: TranscriptionClient,
    retry: RetryPolicy,
    parameter_schema: Value,
}

impl InterviewTranscriber {
    /// Creates a transcriber reading audio from `interview_dir` and caching
    /// transcripts in `cache_dir`.
    pub fn new<P1: Into<PathBuf>, P2: Into<PathBuf>>(
        interview_dir: P1,
        cache_dir: P2,
        client: TranscriptionClient,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            interview_dir: interview_dir.into(),
            cache_dir: cache_dir.into(),
            client,
            retry,
            parameter_schema: schema_for!(ResolveTranscriptParameters)
                .to_value(),
        }
    }

    /// Returns the transcript of `case_id`, transcribing its interview if
    /// it is not cached yet.
    pub async fn resolve_transcript(
        &self,
        case_id: &str,
    ) -> ToolResult<Transcript> {
        validate_case_id(case_id)?;

        let cache_path = self.cache_path(case_id);
        if let Some(text) = read_cached(&cache_path).await? {
            debug!("transcript of case {case_id} served from cache");
            return Ok(Transcript {
                case_id: case_id.to_owned(),
                text,
                cached: true,
            });
        }

        let Some(audio_path) = self.find_audio(case_id).await? else {
            return Err(ToolError::not_found().with_reason(format!(
                "no interview audio for case {case_id} in {}",
                self.interview_dir.display()
            )));
        };
        let audio = load_audio(&audio_path).await?;

        let text = with_retry(&self.retry, "transcription", || {
            let fut = self.client.transcribe(audio.clone());
            async move {
                let text = fut.await?;
                if text.trim().is_empty() {
                    return Err(ProviderFailure::new(
                        ProviderErrorKind::InvalidResponse,
                        "empty transcript",
                    ));
                }
                Ok(text)
            }
        })
        .await
        .map_err(|failure| match failure.kind() {
            ProviderErrorKind::Moderated => ToolError::validation()
                .with_reason(format!("the interview was rejected: {failure}")),
            _ => ToolError::provider()
                .with_reason(format!("transcription failed: {failure}")),
        })?;

        match write_atomic(
            &self.cache_dir,
            &cache_file_name(case_id),
            Bytes::from(text.clone()),
            Existing::Replace,
        )
        .await
        {
            Ok(path) => info!("cached transcript of case {case_id} at {}", path.display()),
            // The transcript is still good, the next call will just pay for
            // another transcription.
            Err(err) => error!("cannot cache transcript of case {case_id}: {err}"),
        }

        Ok(Transcript {
            case_id: case_id.to_owned(),
            text,
            cached: false,
        })
    }

    #[inline]
    fn cache_path(&self, case_id: &str) -> PathBuf {
        self.cache_dir.join(cache_file_name(case_id))
    }

    async fn find_audio(&self, case_id: &str) -> ToolResult<Option<PathBuf>> {
        let interview_dir = self.interview_dir.clone();
        let case_id = case_id.to_owned();
        spawn_blocking(move || find_audio_blocking(&interview_dir, &case_id))
            .await
            .map_err(|_| ToolError::io().with_reason("lookup task was aborted"))?
    }
}

#[inline]
fn cache_file_name(case_id: &str) -> String {
    format!("{case_id}.txt")
}

async fn read_cached(path: &Path) -> ToolResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) if err.kind() == io::ErrorKind::InvalidData => {
            warn!("ignoring corrupted transcript {}: {err}", path.display());
            Ok(None)
        }
        Err(err) => Err(ToolError::from_io(
            format!("cannot read transcript {}", path.display()),
            err,
        )),
    }
}

async fn load_audio(path: &Path) -> ToolResult<AudioInput> {
    let data = tokio::fs::read(path).await.map_err(|err| {
        ToolError::from_io(format!("cannot read {}", path.display()), err)
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(AudioInput {
        file_name,
        data: Bytes::from(data),
    })
}

/// Finds the audio whose stem is the case id, or contains it as a `-`/`_`
/// separated token, like `interview-00012025.m4a`.
fn find_audio_blocking(
    interview_dir: &Path,
    case_id: &str,
) -> ToolResult<Option<PathBuf>> {
    let entries = match std::fs::read_dir(interview_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ToolError::from_io(
                format!("cannot list {}", interview_dir.display()),
                err,
            ));
        }
    };

    let mut matches = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_audio_of(path, case_id))
        .collect::<Vec<_>>();
    matches.sort();
    Ok(matches.into_iter().next())
}

fn is_audio_of(path: &Path, case_id: &str) -> bool {
    let is_audio = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false);
    let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
        return false;
    };
    is_audio
        && (stem == case_id || stem.split(['-', '_']).any(|t| t == case_id))
}

impl Tool for InterviewTranscriber {
    type Input = ResolveTranscriptParameters;
    type Output = Transcript;

    fn kind(&self) -> ToolKind {
        ToolKind::ResolveTranscript
    }

    fn description(&self) -> &str {
        r#"
Returns the transcript of the interview recorded about the accident of a case.
The audio is transcribed on the first call and cached, later calls for the same case are free."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: ResolveTranscriptParameters,
    ) -> impl Future<Output = ToolResult<Transcript>> + Send {
        async move { self.resolve_transcript(&input.case_id).await }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use claim_agent_test_model::TestTranscriber;
    use tempfile::TempDir;

    use super::*;
    use crate::tool::ErrorKind;

    struct Fixture {
        root: TempDir,
        provider: TestTranscriber,
        transcriber: InterviewTranscriber,
    }

    fn fixture(provider: TestTranscriber) -> Fixture {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("interviews")).unwrap();
        let transcriber = InterviewTranscriber::new(
            root.path().join("interviews"),
            root.path().join("transcripts"),
            TranscriptionClient::new(provider.clone()),
            RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(100),
                call_timeout: Duration::from_secs(5),
            },
        );
        Fixture {
            root,
            provider,
            transcriber,
        }
    }

    impl Fixture {
        fn add_audio(&self, file_name: &str) {
            let path = self.root.path().join("interviews").join(file_name);
            std::fs::write(path, b"fake audio").unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transcribes_once_then_caches() {
        let fx = fixture(TestTranscriber::with_text("we heard a loud crash"));
        fx.add_audio("00012025.m4a");

        let first = fx.transcriber.resolve_transcript("00012025").await.unwrap();
        assert_eq!(first.text, "we heard a loud crash");
        assert!(!first.cached);
        assert_eq!(
            std::fs::read_to_string(fx.root.path().join("transcripts/00012025.txt"))
                .unwrap(),
            "we heard a loud crash"
        );

        let second = fx.transcriber.resolve_transcript("00012025").await.unwrap();
        assert_eq!(second.text, first.text);
        assert!(second.cached);
        assert_eq!(fx.provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_is_keyed_by_case() {
        let fx = fixture(TestTranscriber::per_file());
        fx.add_audio("interview-00012025.m4a");
        fx.add_audio("interview-00012026.mp3");

        let first = fx.transcriber.resolve_transcript("00012025").await.unwrap();
        let second = fx.transcriber.resolve_transcript("00012026").await.unwrap();
        assert_eq!(first.text, "transcript of interview-00012025.m4a");
        assert_eq!(second.text, "transcript of interview-00012026.mp3");
        assert!(!second.cached);

        let again = fx.transcriber.resolve_transcript("00012025").await.unwrap();
        assert_eq!(again.text, first.text);
        assert_eq!(fx.provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_audio_is_not_found() {
        let fx = fixture(TestTranscriber::with_text("unused"));
        fx.add_audio("00099999.m4a");
        fx.add_audio("00012025.txt");

        let err = fx
            .transcriber
            .resolve_transcript("00012025")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(fx.provider.calls(), 0);

        std::fs::remove_dir_all(fx.root.path().join("interviews")).unwrap();
        let err = fx
            .transcriber
            .resolve_transcript("00012025")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let fx = fixture(TestTranscriber::with_text("finally").fail_first(2));
        fx.add_audio("00012025.wav");

        let transcript =
            fx.transcriber.resolve_transcript("00012025").await.unwrap();
        assert_eq!(transcript.text, "finally");
        assert_eq!(fx.provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_error_after_retries() {
        let fx = fixture(
            TestTranscriber::with_text("never")
                .fail_always(ProviderErrorKind::Other),
        );
        fx.add_audio("00012025.wav");

        let err = fx
            .transcriber
            .resolve_transcript("00012025")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        assert_eq!(fx.provider.calls(), 3);
        assert!(!fx.root.path().join("transcripts/00012025.txt").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retried() {
        let fx = fixture(
            TestTranscriber::with_text("slow").with_delay(Duration::from_secs(30)),
        );
        fx.add_audio("00012025.wav");

        let err = fx
            .transcriber
            .resolve_transcript("00012025")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        assert_eq!(fx.provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_rejects_unsafe_case_id() {
        let fx = fixture(TestTranscriber::with_text("unused"));
        let err = fx
            .transcriber
            .resolve_transcript("../secrets")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn test_is_audio_of() {
        assert!(is_audio_of(Path::new("/x/00012025.M4A"), "00012025"));
        assert!(is_audio_of(Path::new("/x/case_00012025_take2.mp3"), "00012025"));
        assert!(!is_audio_of(Path::new("/x/000120250.mp3"), "00012025"));
        assert!(!is_audio_of(Path::new("/x/00012025.pdf"), "00012025"));
    }
}
