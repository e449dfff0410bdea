use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{Module, ModuleFormat, Version};
use crate::config::BaseRuntime;
use crate::errors::{Result, SetupError};
use crate::resolver::{AssemblyResolver, EmbeddedResolver, ResolutionReport};

/// A module together with the resolver bound to it
pub struct ReadModule {
    pub module: Arc<Module>,
    pub resolver: EmbeddedResolver,
    pub resolution: ResolutionReport,
}

/// Opens modules from disk and wires up their dependency resolution
pub struct ModuleReader {
    format: Arc<dyn ModuleFormat>,
    fallback: Arc<dyn AssemblyResolver>,
    runtime: BaseRuntime,
}

impl ModuleReader {
    pub fn new(
        format: Arc<dyn ModuleFormat>,
        fallback: Arc<dyn AssemblyResolver>,
        runtime: BaseRuntime,
    ) -> Self {
        Self {
            format,
            fallback,
            runtime,
        }
    }

    /// Read a module and check that it declares `expected_version`
    pub fn read(&self, path: &Path, expected_version: Version) -> Result<ReadModule> {
        let bytes = std::fs::read(path).map_err(|e| SetupError::io(path, e))?;
        let module = self.format.parse(path, &bytes)?;

        if module.version != expected_version {
            return Err(SetupError::VersionMismatch {
                module: module.name,
                expected: expected_version,
                found: module.version,
            });
        }

        let module = Arc::new(module);
        let resolver = EmbeddedResolver::new(
            module.clone(),
            self.format.clone(),
            self.fallback.clone(),
            self.runtime.clone(),
        );
        let resolution = resolver.resolve_all();

        info!(
            "Read {} {} ({} types, {} resources; references: {} resolved, {} skipped, {} not found)",
            module.name,
            module.version,
            module.types.len(),
            module.resources.len(),
            resolution.resolved,
            resolution.skipped,
            resolution.not_found
        );

        Ok(ReadModule {
            module,
            resolver,
            resolution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ImageFormat;
    use crate::resolver::NullResolver;
    use tempfile::TempDir;

    fn reader() -> ModuleReader {
        ModuleReader::new(
            Arc::new(ImageFormat),
            Arc::new(NullResolver),
            BaseRuntime::default(),
        )
    }

    #[test]
    fn test_read_module() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Terraria.exe");
        ImageFormat::write(&Module::new("Terraria", Version::new(1, 4, 4, 9)), &path).unwrap();

        let read = reader().read(&path, Version::new(1, 4, 4, 9)).unwrap();
        assert_eq!(read.module.name, "Terraria");
        assert!(Arc::ptr_eq(read.resolver.owner(), &read.module));
    }

    #[test]
    fn test_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Terraria.exe");
        ImageFormat::write(&Module::new("Terraria", Version::new(1, 4, 3, 6)), &path).unwrap();

        let err = reader().read(&path, Version::new(1, 4, 4, 9)).err().unwrap();
        match err {
            SetupError::VersionMismatch {
                module,
                expected,
                found,
            } => {
                assert_eq!(module, "Terraria");
                assert_eq!(expected, Version::new(1, 4, 4, 9));
                assert_eq!(found, Version::new(1, 4, 3, 6));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = reader()
            .read(&dir.path().join("absent.exe"), Version::default())
            .err()
            .unwrap();
        assert!(matches!(err, SetupError::Io { .. }));
    }
}
