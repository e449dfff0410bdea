use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::module::Version;

/// Pipeline stage an error surfaced from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadingModule,
    ResolvingDependency,
    Planning,
    ExecutingItem,
    WritingDescriptor,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ReadingModule => "reading module",
            Stage::ResolvingDependency => "resolving dependency",
            Stage::Planning => "planning",
            Stage::ExecutingItem => "executing item",
            Stage::WritingDescriptor => "writing descriptor",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse module {path}: {message}")]
    ModuleFormat { path: PathBuf, message: String },

    #[error("Version mismatch for {module}: expected {expected}, found {found}")]
    VersionMismatch {
        module: String,
        expected: Version,
        found: Version,
    },

    #[error("Planning collision in {module}: {path} is claimed twice")]
    PlanningCollision { module: String, path: String },

    #[error("Work item '{label}' failed: {source}")]
    ItemFault {
        label: String,
        #[source]
        source: Box<SetupError>,
    },

    #[error("Work item panicked: {0}")]
    Panicked(String),

    #[error("Decompilation failed: {0}")]
    Decompile(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<SetupError>,
    },
}

impl SetupError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SetupError::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the pipeline stage. Cancellation and already-staged errors pass
    /// through; an item fault keeps the stage its item reported.
    pub fn at(self, stage: Stage) -> Self {
        match self {
            SetupError::Cancelled | SetupError::Stage { .. } => self,
            SetupError::ItemFault { ref source, .. } => {
                let stage = source.stage().unwrap_or(stage);
                SetupError::Stage {
                    stage,
                    source: Box::new(self),
                }
            }
            other => SetupError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            SetupError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// True for a caller-initiated abort, including one wrapped by a stage.
    pub fn is_cancelled(&self) -> bool {
        match self {
            SetupError::Cancelled => true,
            SetupError::Stage { source, .. } | SetupError::ItemFault { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SetupError>;
