use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{Result, SetupError};
use crate::fs::write_atomic;

/// Manifest format version - increment when the structure changes
pub const MANIFEST_VERSION: u32 = 1;

/// Completion manifest file name, written at the root of the output tree
pub const MANIFEST_FILE_NAME: &str = ".modsetup.json";

/// An input module and the hash of its bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRecord {
    pub path: PathBuf,
    pub hash: String,
}

/// Written only after a fully successful run; its presence marks the tree
/// as complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeManifest {
    pub version: u32,
    pub config_hash: String,
    pub inputs: Vec<InputRecord>,
    /// Every file written by the run, sorted
    pub files: Vec<String>,
}

impl TreeManifest {
    pub fn new(config_hash: String, inputs: Vec<InputRecord>, mut files: Vec<String>) -> Self {
        files.sort();
        Self {
            version: MANIFEST_VERSION,
            config_hash,
            inputs,
            files,
        }
    }

    pub fn path_in(out_dir: &Path) -> PathBuf {
        out_dir.join(MANIFEST_FILE_NAME)
    }

    pub fn save(&self, out_dir: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| SetupError::Config(e.to_string()))?;
        write_atomic(&Self::path_in(out_dir), json.as_bytes())
    }

    pub fn load(out_dir: &Path) -> Result<Self> {
        let path = Self::path_in(out_dir);
        let content = std::fs::read_to_string(&path).map_err(|e| SetupError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|e| SetupError::Config(e.to_string()))
    }

    /// Remove a previous run's manifest so a partial tree is never mistaken
    /// for a complete one
    pub fn invalidate(out_dir: &Path) -> Result<()> {
        let path = Self::path_in(out_dir);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SetupError::io(path, e)),
        }
    }
}

/// Whether `out_dir` holds a tree from a completed run
pub fn is_complete(out_dir: &Path) -> bool {
    TreeManifest::load(out_dir)
        .map(|m| m.version == MANIFEST_VERSION)
        .unwrap_or(false)
}

/// Blake3 hash of a file's content
pub fn hash_file(path: &Path) -> Result<String> {
    let content = std::fs::read(path).map_err(|e| SetupError::io(path, e))?;
    Ok(blake3::hash(&content).to_hex().to_string())
}
