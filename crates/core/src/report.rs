use std::path::PathBuf;

use bytes::Bytes;
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

use crate::case_store::validate_case_id;
use crate::fs::{Existing, write_atomic};
use crate::tool::{Error as ToolError, Tool, ToolKind, ToolResult};

/// Arguments of `save`.
#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveReportParameters {
    #[schemars(description = "The complete report in markdown.")]
    markdown: String,
    #[schemars(description = "Id of the case the report is about.")]
    case_id: String,
}

/// Writes final reports into the report folder.
///
/// Every call produces a new file named `{case id}-{uuid}-report.md`,
/// reports are never overwritten.
pub struct ReportPersister {
    report_dir: PathBuf,
    parameter_schema: Value,
}

impl ReportPersister {
    /// Creates a persister writing into `report_dir`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(report_dir: P) -> Self {
        Self {
            report_dir: report_dir.into(),
            parameter_schema: schema_for!(SaveReportParameters).to_value(),
        }
    }

    /// Saves the report and returns its path.
    pub async fn save(
        &self,
        markdown: &str,
        case_id: &str,
    ) -> ToolResult<PathBuf> {
        validate_case_id(case_id)?;
        if markdown.trim().is_empty() {
            return Err(
                ToolError::validation().with_reason("`markdown` is empty")
            );
        }

        let file_name =
            format!("{case_id}-{}-report.md", uuid::Uuid::new_v4());
        let path = write_atomic(
            &self.report_dir,
            &file_name,
            Bytes::copy_from_slice(markdown.as_bytes()),
            Existing::Keep,
        )
        .await?;
        info!("saved report of case {case_id} to {}", path.display());
        Ok(path)
    }
}

impl Tool for ReportPersister {
    type Input = SaveReportParameters;
    type Output = PathBuf;

    fn kind(&self) -> ToolKind {
        ToolKind::Save
    }

    fn description(&self) -> &str {
        r#"
Saves the final claim report as a markdown file and returns its path.
Only call it once the report is complete. Each call creates a new file."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: SaveReportParameters,
    ) -> impl Future<Output = ToolResult<PathBuf>> + Send {
        async move { self.save(&input.markdown, &input.case_id).await }
    }
}
