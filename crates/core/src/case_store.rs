use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::spawn_blocking;

use crate::tool::{Error as ToolError, Tool, ToolKind, ToolResult};

const MAX_CASE_ID_LEN: usize = 128;

/// A pending case read from the inbox.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    /// Case id derived from the file name, if it carries one.
    pub id: Option<String>,
    /// Name of the inbox file.
    pub file_name: String,
    /// The raw case text.
    pub content: String,
}

impl CaseRecord {
    fn from_file(file_name: String, content: String) -> Self {
        let stem = Path::new(&file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        Self {
            id: case_id_from_stem(stem),
            file_name,
            content,
        }
    }
}

/// Takes the last `-`/`_` separated token of the stem when it looks like an
/// id, so `case-00012025` gives `00012025`.
fn case_id_from_stem(stem: &str) -> Option<String> {
    let token = stem.rsplit(['-', '_']).next()?;
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(token.to_owned())
}

/// Checks an id the model passed in. Ids end up in file names, so only
/// ASCII alphanumerics, `-` and `_` are accepted.
pub(crate) fn validate_case_id(case_id: &str) -> ToolResult<()> {
    if case_id.is_empty() {
        return Err(ToolError::validation().with_reason("`caseId` is empty"));
    }
    if case_id.len() > MAX_CASE_ID_LEN {
        return Err(ToolError::validation().with_reason(format!(
            "`caseId` is longer than {MAX_CASE_ID_LEN} characters"
        )));
    }
    let valid = case_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ToolError::validation().with_reason(format!(
            "`caseId` {case_id:?} may only contain letters, digits, `-` and `_`"
        )));
    }
    Ok(())
}

/// Arguments of `fetchNextCase`, there are none.
#[derive(Deserialize, JsonSchema)]
pub struct FetchCaseParameters {}

/// Reads pending cases from the inbox folder.
///
/// The inbox is never modified, fetching twice returns the same case.
pub struct CaseStore {
    inbox_dir: PathBuf,
    parameter_schema: Value,
}

impl CaseStore {
    /// Creates a store reading from `inbox_dir`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(inbox_dir: P) -> Self {
        Self {
            inbox_dir: inbox_dir.into(),
            parameter_schema: schema_for!(FetchCaseParameters).to_value(),
        }
    }

    /// Returns the first readable case in file name order, or `None` when
    /// the inbox is empty or missing.
    pub async fn fetch_next_case(&self) -> ToolResult<Option<CaseRecord>> {
        let inbox_dir = self.inbox_dir.clone();
        spawn_blocking(move || read_next_case(&inbox_dir))
            .await
            .map_err(|_| ToolError::io().with_reason("inbox task was aborted"))?
    }
}

fn read_next_case(inbox_dir: &Path) -> ToolResult<Option<CaseRecord>> {
    let entries = match std::fs::read_dir(inbox_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("inbox {} does not exist", inbox_dir.display());
            return Ok(None);
        }
        Err(err) => {
            return Err(ToolError::from_io(
                format!("cannot list inbox {}", inbox_dir.display()),
                err,
            ));
        }
    };

    let mut candidates: Vec<(OsString, PathBuf)> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping an unreadable inbox entry: {err}");
                None
            }
        })
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| (entry.file_name(), entry.path()))
        .filter(|(_, path)| path.is_file())
        .collect();
    candidates.sort();

    for (file_name, path) in candidates {
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let file_name = file_name.to_string_lossy().into_owned();
                debug!("loaded case from {file_name}");
                return Ok(Some(CaseRecord::from_file(file_name, content)));
            }
            Err(err) => {
                warn!("skipping unreadable case {}: {err}", path.display());
            }
        }
    }
    debug!("inbox {} has no readable case", inbox_dir.display());
    Ok(None)
}

impl Tool for CaseStore {
    type Input = FetchCaseParameters;
    type Output = Option<CaseRecord>;

    fn kind(&self) -> ToolKind {
        ToolKind::FetchCase
    }

    fn description(&self) -> &str {
        r#"
Returns the next pending traffic accident case from the claims inbox, or null when the inbox is empty.
The case text usually contains the case id needed by the other tools."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        _input: FetchCaseParameters,
    ) -> impl Future<Output = ToolResult<Option<CaseRecord>>> + Send {
        self.fetch_next_case()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_missing_or_empty_inbox() {
        let root = TempDir::new().unwrap();

        let store = CaseStore::new(root.path().join("missing"));
        assert_eq!(store.fetch_next_case().await.unwrap(), None);

        let store = CaseStore::new(root.path());
        assert_eq!(store.fetch_next_case().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_single_case() {
        let inbox = TempDir::new().unwrap();
        std::fs::write(
            inbox.path().join("case-00012025.txt"),
            "impact at 5th and Main",
        )
        .unwrap();

        let store = CaseStore::new(inbox.path());
        let record = store.fetch_next_case().await.unwrap().unwrap();
        assert_eq!(record.content, "impact at 5th and Main");
        assert_eq!(record.id.as_deref(), Some("00012025"));
        assert_eq!(record.file_name, "case-00012025.txt");
    }

    #[tokio::test]
    async fn test_lexicographic_order() {
        let inbox = TempDir::new().unwrap();
        std::fs::write(inbox.path().join("case-b.txt"), "second").unwrap();
        std::fs::write(inbox.path().join("case-a.txt"), "first").unwrap();
        std::fs::write(inbox.path().join(".tmp-partial"), "hidden").unwrap();
        std::fs::create_dir(inbox.path().join("0-archive")).unwrap();

        let store = CaseStore::new(inbox.path());
        for _ in 0..2 {
            let record = store.fetch_next_case().await.unwrap().unwrap();
            assert_eq!(record.content, "first");
        }
    }

    #[tokio::test]
    async fn test_skips_unreadable_files() {
        let inbox = TempDir::new().unwrap();
        std::fs::write(inbox.path().join("a.bin"), [0xffu8, 0xfe, 0x00]).unwrap();
        std::fs::write(inbox.path().join("b.txt"), "readable").unwrap();

        let store = CaseStore::new(inbox.path());
        let record = store.fetch_next_case().await.unwrap().unwrap();
        assert_eq!(record.content, "readable");
    }

    #[tokio::test]
    async fn test_inbox_that_is_a_file() {
        let root = TempDir::new().unwrap();
        let inbox = root.path().join("cases");
        std::fs::write(&inbox, "oops").unwrap();

        let store = CaseStore::new(&inbox);
        let err = store.fetch_next_case().await.unwrap_err();
        assert_eq!(err.kind(), crate::tool::ErrorKind::IoError);
    }

    #[test]
    fn test_case_id_from_stem() {
        assert_eq!(case_id_from_stem("case-00012025").as_deref(), Some("00012025"));
        assert_eq!(case_id_from_stem("00012025").as_deref(), Some("00012025"));
        assert_eq!(case_id_from_stem("claim_A17").as_deref(), Some("A17"));
        assert_eq!(case_id_from_stem("case-"), None);
        assert_eq!(case_id_from_stem("late report"), None);
    }

    #[test]
    fn test_validate_case_id() {
        assert!(validate_case_id("00012025").is_ok());
        assert!(validate_case_id("case_7-b").is_ok());
        assert!(validate_case_id("").is_err());
        assert!(validate_case_id("../etc/passwd").is_err());
        assert!(validate_case_id(&"9".repeat(MAX_CASE_ID_LEN + 1)).is_err());
    }
}
