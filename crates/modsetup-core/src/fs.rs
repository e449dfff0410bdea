use std::io::Write;
use std::path::Path;

use crate::errors::{Result, SetupError};

/// Write `contents` so that `path` holds either nothing or the whole file
///
/// Content goes to a temporary sibling first and is then renamed over the
/// target. Parent directories are created as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| SetupError::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| SetupError::io(parent, e))?;
    tmp.write_all(contents).map_err(|e| SetupError::io(path, e))?;
    tmp.persist(path).map_err(|e| SetupError::io(path, e.error))?;
    Ok(())
}

/// Remove `dir` if present and create it empty
pub fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| SetupError::io(dir, e))?;
    }
    std::fs::create_dir_all(dir).map_err(|e| SetupError::io(dir, e))
}

/// Join a `/`-separated relative path onto `root`
pub fn join_relative(root: &Path, relative: &str) -> std::path::PathBuf {
    relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
}
