//! Run helpers wiring test doubles through the Container

use std::sync::Arc;

use modsetup_core::config::SetupConfig;
use modsetup_core::decompiler::{Decompiler, SkeletonDecompiler};
use modsetup_core::di::Container;
use modsetup_core::errors::Result;
use modsetup_core::module::ImageFormat;
use modsetup_core::orchestrator::{RunSummary, SetupTask};
use modsetup_core::progress::CollectingProgressHandler;
use modsetup_core::resolver::NullResolver;
use modsetup_core::scheduler::CancellationToken;

/// Container with collecting progress, no search directory and `decompiler`
pub fn test_container(
    config: SetupConfig,
    decompiler: Arc<dyn Decompiler>,
) -> (Container, Arc<CollectingProgressHandler>) {
    let progress = Arc::new(CollectingProgressHandler::new());
    let container = Container::with_dependencies(
        config,
        progress.clone(),
        decompiler,
        Arc::new(ImageFormat::new()),
        Arc::new(NullResolver),
    );
    (container, progress)
}

/// Run setup with the skeleton decompiler
pub fn run(config: SetupConfig) -> (Result<RunSummary>, Arc<CollectingProgressHandler>) {
    run_with(config, Arc::new(SkeletonDecompiler::new()), &CancellationToken::new())
}

pub fn run_with(
    config: SetupConfig,
    decompiler: Arc<dyn Decompiler>,
    token: &CancellationToken,
) -> (Result<RunSummary>, Arc<CollectingProgressHandler>) {
    let (container, progress) = test_container(config, decompiler);
    (SetupTask::new(container).run(token), progress)
}
