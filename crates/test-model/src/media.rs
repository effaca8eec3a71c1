use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use claim_agent_model::{
    AudioInput, ErrorKind, ImageProvider, TranscriptionProvider,
};
use tokio::time::sleep;

use crate::Error;

/// The smallest valid PNG signature, returned by [`TestImageGenerator`].
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Decides which calls of a fake provider fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FailurePlan {
    Never,
    First(u64, ErrorKind),
    Always(ErrorKind),
}

impl FailurePlan {
    fn check(self, call: u64, message: &'static str) -> Result<(), Error> {
        match self {
            FailurePlan::Never => Ok(()),
            FailurePlan::First(times, kind) if call <= times => {
                Err(Error::new(message, kind))
            }
            FailurePlan::First(..) => Ok(()),
            FailurePlan::Always(kind) => Err(Error::new(message, kind)),
        }
    }
}

enum TranscriptText {
    Fixed(String),
    PerFile,
}

/// A fake transcription provider that counts its calls.
///
/// Clones share the call counter, so a test can keep one clone around and
/// hand the other to the code under test.
#[derive(Clone)]
pub struct TestTranscriber {
    text: Arc<TranscriptText>,
    plan: FailurePlan,
    delay: Option<Duration>,
    calls: Arc<AtomicU64>,
}

impl TestTranscriber {
    /// Always transcribes to `text`.
    pub fn with_text<S: Into<String>>(text: S) -> Self {
        Self::new(TranscriptText::Fixed(text.into()))
    }

    /// Transcribes to `transcript of <file name>`, so that callers can tell
    /// which audio asset was sent.
    pub fn per_file() -> Self {
        Self::new(TranscriptText::PerFile)
    }

    fn new(text: TranscriptText) -> Self {
        Self {
            text: Arc::new(text),
            plan: FailurePlan::Never,
            delay: None,
            calls: Default::default(),
        }
    }

    /// Fails the first `times` calls with a rate limit error.
    pub fn fail_first(mut self, times: u64) -> Self {
        self.plan = FailurePlan::First(times, ErrorKind::RateLimitExceeded);
        self
    }

    /// Fails every call with an error of `kind`.
    pub fn fail_always(mut self, kind: ErrorKind) -> Self {
        self.plan = FailurePlan::Always(kind);
        self
    }

    /// Waits for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns how many times `transcribe` was called.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TranscriptionProvider for TestTranscriber {
    type Error = Error;

    fn transcribe(
        &self,
        audio: AudioInput,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let plan = self.plan;
        let delay = self.delay;
        let text = match self.text.as_ref() {
            TranscriptText::Fixed(text) => text.clone(),
            TranscriptText::PerFile => {
                format!("transcript of {}", audio.file_name)
            }
        };
        async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            plan.check(call, "scripted transcription failure")?;
            if audio.data.is_empty() {
                return Err(Error::new("empty audio", ErrorKind::Moderated));
            }
            Ok(text)
        }
    }
}

/// A fake image generator that answers with [`FAKE_PNG`].
#[derive(Clone)]
pub struct TestImageGenerator {
    plan: FailurePlan,
    empty_payload: bool,
    calls: Arc<AtomicU64>,
}

impl TestImageGenerator {
    /// Creates a generator that always succeeds.
    pub fn new() -> Self {
        Self {
            plan: FailurePlan::Never,
            empty_payload: false,
            calls: Default::default(),
        }
    }

    /// Fails the first `times` calls with a rate limit error.
    pub fn fail_first(mut self, times: u64) -> Self {
        self.plan = FailurePlan::First(times, ErrorKind::RateLimitExceeded);
        self
    }

    /// Fails every call with an error of `kind`.
    pub fn fail_always(mut self, kind: ErrorKind) -> Self {
        self.plan = FailurePlan::Always(kind);
        self
    }

    /// Answers with zero bytes instead of an image.
    pub fn with_empty_payload(mut self) -> Self {
        self.empty_payload = true;
        self
    }

    /// Returns how many times `generate_image` was called.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for TestImageGenerator {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProvider for TestImageGenerator {
    type Error = Error;

    fn generate_image(
        &self,
        _prompt: &str,
    ) -> impl Future<Output = Result<Bytes, Self::Error>> + Send + 'static
    {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self
            .plan
            .check(call, "scripted image failure")
            .map(|_| {
                if self.empty_payload {
                    Bytes::new()
                } else {
                    Bytes::from_static(FAKE_PNG)
                }
            });
        std::future::ready(result)
    }
}
