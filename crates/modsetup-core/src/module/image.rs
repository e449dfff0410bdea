use std::path::Path;

use super::Module;
use crate::errors::{Result, SetupError};

/// Magic prefix of a serialized module image
pub const IMAGE_MAGIC: &[u8; 8] = b"MSETUP01";

/// Turns raw module bytes into a [`Module`]
///
/// This is the seam where a real binary parser plugs in. `origin` names the
/// file or embedded resource the bytes came from and is only used for errors.
pub trait ModuleFormat: Send + Sync {
    fn parse(&self, origin: &Path, bytes: &[u8]) -> Result<Module>;
}

/// Module image: magic header followed by a bincode encoding of the module
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageFormat;

impl ImageFormat {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(module: &Module) -> Result<Vec<u8>> {
        let body = bincode::serialize(module)
            .map_err(|e| SetupError::Config(format!("Failed to encode module image: {}", e)))?;
        let mut bytes = Vec::with_capacity(IMAGE_MAGIC.len() + body.len());
        bytes.extend_from_slice(IMAGE_MAGIC);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    pub fn write(module: &Module, path: &Path) -> Result<()> {
        let bytes = Self::encode(module)?;
        std::fs::write(path, bytes).map_err(|e| SetupError::io(path, e))
    }
}

impl ModuleFormat for ImageFormat {
    fn parse(&self, origin: &Path, bytes: &[u8]) -> Result<Module> {
        let body = bytes
            .strip_prefix(IMAGE_MAGIC.as_slice())
            .ok_or_else(|| SetupError::ModuleFormat {
                path: origin.to_path_buf(),
                message: "missing module image header".to_string(),
            })?;

        bincode::deserialize(body).map_err(|e| SetupError::ModuleFormat {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }
}
