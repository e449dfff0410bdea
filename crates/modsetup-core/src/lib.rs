pub mod config;
pub mod culture;
pub mod decompiler;
pub mod descriptor;
pub mod di;
pub mod errors;
pub mod file_set;
pub mod fs;
pub mod manifest;
pub mod module;
pub mod orchestrator;
pub mod planner;
pub mod progress;
pub mod resolver;
pub mod scheduler;

pub use config::{
    BaseRuntime, BraceStyle, CliOverrides, FormattingOptions, ModuleInput, Precedence,
    SetupConfig,
};
pub use decompiler::{Decompiler, SkeletonDecompiler};
pub use di::Container;
pub use errors::{SetupError, Stage};
pub use file_set::GlobalFileSet;
pub use manifest::{is_complete, TreeManifest};
pub use module::{
    AssemblyReference, ImageFormat, Module, ModuleFormat, ModuleReader, ReadModule, Resource,
    ResourceKind, TypeDefinition, TypeKind, Version,
};
pub use orchestrator::{run_setup, ModuleSummary, Role, RunSummary, SetupTask};
pub use planner::{ContentSource, DefaultTypeFilter, FilePlan, FilePlanEntry, PathKey, TypeFilter};
pub use progress::{
    CollectingProgressHandler, ConsoleProgressHandler, ProgressEvent, ProgressHandler,
};
pub use resolver::{
    AssemblyResolver, DirectoryResolver, EmbeddedResolver, NullResolver, Resolution,
    ResolutionReport,
};
pub use scheduler::{CancellationToken, ExecutionReport, Scheduler, WorkItem};
