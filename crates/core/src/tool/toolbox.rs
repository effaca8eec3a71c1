use std::path::{Path, PathBuf};

use claim_agent_model::ModelTool;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use super::{Error, Tool, ToolKind, ToolResult};
use crate::case_store::{CaseRecord, CaseStore};
use crate::config::ClaimConfig;
use crate::media_client::{ImageClient, TranscriptionClient};
use crate::report::ReportPersister;
use crate::sketch::{Sketch, SketchGenerator};
use crate::transcriber::{InterviewTranscriber, Transcript};

/// The successful result of a tool call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutput {
    /// The next pending case, if any.
    Case(Option<CaseRecord>),
    /// An interview transcript.
    Transcript(Transcript),
    /// A generated sketch.
    Sketch(Sketch),
    /// The path of a saved report.
    Report(PathBuf),
}

#[derive(Serialize)]
struct SavedReport<'a> {
    path: &'a Path,
}

impl ToolOutput {
    /// Converts the output into the `data` of a tool envelope.
    pub fn to_data(&self) -> Result<Value, serde_json::Error> {
        match self {
            ToolOutput::Case(case) => serde_json::to_value(case),
            ToolOutput::Transcript(transcript) => {
                serde_json::to_value(transcript)
            }
            ToolOutput::Sketch(sketch) => serde_json::to_value(sketch),
            ToolOutput::Report(path) => {
                serde_json::to_value(SavedReport { path })
            }
        }
    }
}

/// The fixed set of tools, one component per [`ToolKind`].
pub struct Toolbox {
    case_store: CaseStore,
    transcriber: InterviewTranscriber,
    sketches: SketchGenerator,
    reports: ReportPersister,
}

impl Toolbox {
    /// Creates a toolbox from its components.
    #[inline]
    pub fn new(
        case_store: CaseStore,
        transcriber: InterviewTranscriber,
        sketches: SketchGenerator,
        reports: ReportPersister,
    ) -> Self {
        Self {
            case_store,
            transcriber,
            sketches,
            reports,
        }
    }

    /// Creates every component with the folders and retry policy of
    /// `config`.
    pub fn from_config(
        config: &ClaimConfig,
        transcription: TranscriptionClient,
        images: ImageClient,
    ) -> Self {
        Self::new(
            CaseStore::new(&config.inbox_dir),
            InterviewTranscriber::new(
                &config.interview_dir,
                &config.transcript_dir,
                transcription,
                config.retry.clone(),
            ),
            SketchGenerator::new(&config.image_dir, images, config.retry.clone()),
            ReportPersister::new(&config.report_dir),
        )
    }

    /// Returns the tool catalog presented to the model.
    pub fn definitions(&self) -> Vec<ModelTool> {
        ToolKind::ALL
            .into_iter()
            .map(|kind| match kind {
                ToolKind::FetchCase => definition(&self.case_store),
                ToolKind::ResolveTranscript => definition(&self.transcriber),
                ToolKind::GenerateSketch => definition(&self.sketches),
                ToolKind::Save => definition(&self.reports),
            })
            .collect()
    }

    /// Runs one tool with the raw arguments sent by the model.
    ///
    /// Arguments that don't match the input of the tool are a
    /// `ValidationError`, the tool is not run.
    pub async fn execute(
        &self,
        kind: ToolKind,
        arguments: Value,
    ) -> ToolResult<ToolOutput> {
        trace!("executing {kind} with args: {arguments}");
        let fut = async {
            match kind {
                ToolKind::FetchCase => {
                    run(&self.case_store, arguments).await.map(ToolOutput::Case)
                }
                ToolKind::ResolveTranscript => run(&self.transcriber, arguments)
                    .await
                    .map(ToolOutput::Transcript),
                ToolKind::GenerateSketch => {
                    run(&self.sketches, arguments).await.map(ToolOutput::Sketch)
                }
                ToolKind::Save => {
                    run(&self.reports, arguments).await.map(ToolOutput::Report)
                }
            }
        };
        let result = fut.instrument(debug_span!("tool execute", tool = %kind)).await;
        if let Err(err) = &result {
            debug!("{kind} failed: {err}");
        }
        result
    }
}

fn definition<T: Tool>(tool: &T) -> ModelTool {
    ModelTool {
        name: tool.kind().name().to_owned(),
        description: tool.description().trim().to_owned(),
        parameters: tool.parameter_schema().clone(),
    }
}

async fn run<T: Tool>(tool: &T, arguments: Value) -> ToolResult<T::Output> {
    // Some models send no arguments at all for tools without parameters.
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        arguments => arguments,
    };
    let input: T::Input = serde_json::from_value(arguments).map_err(|err| {
        Error::validation()
            .with_reason(format!("invalid arguments for {}: {err}", tool.kind()))
    })?;
    tool.execute(input).await
}
