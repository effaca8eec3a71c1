use std::path::{Path, PathBuf};

use crate::retry::RetryPolicy;

/// Bounds of the tool-calling loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LoopPolicy {
    /// Maximum number of model requests in one run.
    pub max_turns: usize,
    /// How many times one tool may be called with the same arguments in a
    /// session. The next identical call fails the session.
    pub max_identical_calls: usize,
}

impl Default for LoopPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            max_turns: 12,
            max_identical_calls: 3,
        }
    }
}

/// Folders and policies shared by the tools and the agent.
///
/// Construct it once with [`ClaimConfigBuilder`] and pass it to the
/// components, nothing in the core reads the environment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClaimConfig {
    /// One file per pending case.
    pub inbox_dir: PathBuf,
    /// One audio asset per case, named after the case id.
    pub interview_dir: PathBuf,
    /// Cached transcripts, `{case id}.txt`.
    pub transcript_dir: PathBuf,
    /// Generated sketches.
    pub image_dir: PathBuf,
    /// Saved reports.
    pub report_dir: PathBuf,
    /// Retry schedule for every provider call.
    pub retry: RetryPolicy,
    /// Bounds of the agent loop.
    pub loop_policy: LoopPolicy,
}

/// Builder for [`ClaimConfig`].
#[derive(Clone, Debug)]
pub struct ClaimConfigBuilder {
    root: PathBuf,
    inbox_dir: Option<PathBuf>,
    interview_dir: Option<PathBuf>,
    transcript_dir: Option<PathBuf>,
    image_dir: Option<PathBuf>,
    report_dir: Option<PathBuf>,
    retry: RetryPolicy,
    loop_policy: LoopPolicy,
}

impl ClaimConfigBuilder {
    /// Creates a builder that lays out every folder under `root`:
    /// `cases`, `interviews`, `transcripts`, `images` and `reports`.
    #[inline]
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            inbox_dir: None,
            interview_dir: None,
            transcript_dir: None,
            image_dir: None,
            report_dir: None,
            retry: RetryPolicy::default(),
            loop_policy: LoopPolicy::default(),
        }
    }

    /// Overrides the inbox folder.
    #[inline]
    pub fn with_inbox_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.inbox_dir = Some(dir.into());
        self
    }

    /// Overrides the interview folder.
    #[inline]
    pub fn with_interview_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.interview_dir = Some(dir.into());
        self
    }

    /// Overrides the transcript cache folder.
    #[inline]
    pub fn with_transcript_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.transcript_dir = Some(dir.into());
        self
    }

    /// Overrides the sketch folder.
    #[inline]
    pub fn with_image_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.image_dir = Some(dir.into());
        self
    }

    /// Overrides the report folder.
    #[inline]
    pub fn with_report_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    /// Sets the retry schedule for provider calls.
    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the bounds of the agent loop.
    #[inline]
    pub fn with_loop_policy(mut self, loop_policy: LoopPolicy) -> Self {
        self.loop_policy = loop_policy;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ClaimConfig {
        let root = self.root;
        let under = |dir: Option<PathBuf>, name: &str| {
            dir.unwrap_or_else(|| Path::new(&root).join(name))
        };
        ClaimConfig {
            inbox_dir: under(self.inbox_dir, "cases"),
            interview_dir: under(self.interview_dir, "interviews"),
            transcript_dir: under(self.transcript_dir, "transcripts"),
            image_dir: under(self.image_dir, "images"),
            report_dir: under(self.report_dir, "reports"),
            retry: self.retry,
            loop_policy: self.loop_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = ClaimConfigBuilder::with_root("/srv/claims")
            .with_report_dir("/tmp/out")
            .build();
        assert_eq!(config.inbox_dir, Path::new("/srv/claims/cases"));
        assert_eq!(config.interview_dir, Path::new("/srv/claims/interviews"));
        assert_eq!(config.transcript_dir, Path::new("/srv/claims/transcripts"));
        assert_eq!(config.image_dir, Path::new("/srv/claims/images"));
        assert_eq!(config.report_dir, Path::new("/tmp/out"));
        assert_eq!(config.loop_policy, LoopPolicy::default());
    }
}
