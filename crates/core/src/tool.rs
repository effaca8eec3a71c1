//! Tool call supports.
//!
//! The agent exposes a closed set of tools, listed by [`ToolKind`]. Each
//! one is implemented by a component that also implements [`Tool`], and
//! the [`Toolbox`] dispatches calls over that fixed set.

mod envelope;
mod error;
mod toolbox;

use std::fmt::{self, Display};

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use envelope::ToolEnvelope;
pub use error::{Error, ErrorKind};
pub use toolbox::{ToolOutput, Toolbox};

/// The result of a tool call.
pub type ToolResult<T> = Result<T, Error>;

/// The tools the model may call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Reads the next pending case from the inbox.
    FetchCase,
    /// Returns the interview transcript of a case.
    ResolveTranscript,
    /// Draws the accident sketch.
    GenerateSketch,
    /// Persists the final report.
    Save,
}

impl ToolKind {
    /// Every tool, in the order they are presented to the model.
    pub const ALL: [ToolKind; 4] = [
        ToolKind::FetchCase,
        ToolKind::ResolveTranscript,
        ToolKind::GenerateSketch,
        ToolKind::Save,
    ];

    /// Returns the name the model uses to call the tool.
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::FetchCase => "fetchNextCase",
            ToolKind::ResolveTranscript => "resolveTranscript",
            ToolKind::GenerateSketch => "generateSketch",
            ToolKind::Save => "save",
        }
    }

    /// Looks a tool up by the name the model used.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tool that can be called by the model.
///
/// Implementations hold their configuration (folders, provider clients) as
/// immutable state, set during initialization. All per-session state lives
/// in the agent.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned + JsonSchema + Send;

    /// The type of a successful result.
    type Output: Send;

    /// Returns which tool of the catalog this is.
    fn kind(&self) -> ToolKind;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult<Self::Output>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("getCase"), None);
        assert_eq!(ToolKind::Save.to_string(), "save");
    }
}
