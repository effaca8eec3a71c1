use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::Builder as TempFileBuilder;
use tokio::task::spawn_blocking;

use crate::tool::Error as ToolError;

/// Prefix of in-flight files. Hidden, so inbox listings never pick them.
const TEMP_PREFIX: &str = ".tmp-";

/// What to do when the destination already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Existing {
    Replace,
    Keep,
}

/// Writes `data` to `dir/file_name` so that the destination is either
/// absent or complete, never partial.
///
/// The folder is created if needed. The data goes to a temporary file in
/// the same folder first, then the file is renamed into place. With
/// [`Existing::Keep`] the rename fails instead of overwriting. On any
/// failure the temporary file is removed.
pub(crate) async fn write_atomic(
    dir: &Path,
    file_name: &str,
    data: Bytes,
    existing: Existing,
) -> Result<PathBuf, ToolError> {
    let dir = dir.to_owned();
    let path = dir.join(file_name);
    spawn_blocking(move || {
        write_atomic_blocking(&dir, &path, &data, existing)
            .map(|_| path.clone())
            .map_err(|err| {
                ToolError::from_io(format!("cannot write {}", path.display()), err)
            })
    })
    .await
    .map_err(|_| ToolError::io().with_reason("write task was aborted"))?
}

fn write_atomic_blocking(
    dir: &Path,
    path: &Path,
    data: &[u8],
    existing: Existing,
) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;

    let mut file = TempFileBuilder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;

    // A failed persist hands the temporary file back, dropping it
    // removes it from the folder.
    match existing {
        Existing::Replace => file.persist(path).map_err(|err| err.error)?,
        Existing::Keep => file.persist_noclobber(path).map_err(|err| err.error)?,
    };
    trace!("wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}
