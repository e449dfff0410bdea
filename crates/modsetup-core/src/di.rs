use crate::config::SetupConfig;
use crate::decompiler::{Decompiler, SkeletonDecompiler};
use crate::module::{ImageFormat, ModuleFormat};
use crate::planner::{DefaultTypeFilter, TypeFilter};
use crate::progress::{ConsoleProgressHandler, ProgressHandler};
use crate::resolver::{AssemblyResolver, DirectoryResolver, NullResolver};
use std::sync::Arc;

/// Dependency injection container
/// Manages all shared dependencies and creates instances with proper wiring
pub struct Container {
    config: Arc<SetupConfig>,
    progress: Arc<dyn ProgressHandler>,
    decompiler: Arc<dyn Decompiler>,
    format: Arc<dyn ModuleFormat>,
    fallback: Arc<dyn AssemblyResolver>,
    type_filter: Arc<dyn TypeFilter>,
}

impl Container {
    /// Create a new container with production dependencies
    pub fn new(config: SetupConfig) -> Self {
        let format: Arc<dyn ModuleFormat> = Arc::new(ImageFormat::new());

        let fallback: Arc<dyn AssemblyResolver> = match &config.search_dir {
            Some(dir) => Arc::new(DirectoryResolver::new(dir.clone(), format.clone())),
            None => Arc::new(NullResolver),
        };

        Container {
            config: Arc::new(config),
            progress: Arc::new(ConsoleProgressHandler::new()),
            decompiler: Arc::new(SkeletonDecompiler::new()),
            format,
            fallback,
            type_filter: Arc::new(DefaultTypeFilter),
        }
    }

    /// Create a container with custom dependencies (for testing)
    pub fn with_dependencies(
        config: SetupConfig,
        progress: Arc<dyn ProgressHandler>,
        decompiler: Arc<dyn Decompiler>,
        format: Arc<dyn ModuleFormat>,
        fallback: Arc<dyn AssemblyResolver>,
    ) -> Self {
        Container {
            config: Arc::new(config),
            progress,
            decompiler,
            format,
            fallback,
            type_filter: Arc::new(DefaultTypeFilter),
        }
    }

    /// Replace the "include in project" predicate
    pub fn with_type_filter(mut self, filter: Arc<dyn TypeFilter>) -> Self {
        self.type_filter = filter;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &Arc<SetupConfig> {
        &self.config
    }

    /// Get the progress handler
    pub fn progress(&self) -> &Arc<dyn ProgressHandler> {
        &self.progress
    }

    pub fn decompiler(&self) -> &Arc<dyn Decompiler> {
        &self.decompiler
    }

    pub fn format(&self) -> &Arc<dyn ModuleFormat> {
        &self.format
    }

    /// Resolver consulted when a dependency is not embedded
    pub fn fallback_resolver(&self) -> &Arc<dyn AssemblyResolver> {
        &self.fallback
    }

    pub fn type_filter(&self) -> &Arc<dyn TypeFilter> {
        &self.type_filter
    }
}
