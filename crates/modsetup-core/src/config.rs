use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{Result, SetupError};
use crate::module::Version;

/// Which module claims a shared output path first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Precedence {
    #[default]
    ClientFirst,
    ServerFirst,
}

impl std::str::FromStr for Precedence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "client" | "client-first" | "clientFirst" => Ok(Precedence::ClientFirst),
            "server" | "server-first" | "serverFirst" => Ok(Precedence::ServerFirst),
            _ => Err(format!(
                "Invalid precedence '{}'. Supported values: client, server",
                s
            )),
        }
    }
}

/// One input module and the version it must declare
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInput {
    pub path: PathBuf,
    pub version: Version,
}

/// Shared base runtime library, skipped during resolution when its major
/// version does not match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseRuntime {
    pub name: String,
    pub major_version: u16,
}

impl Default for BaseRuntime {
    fn default() -> Self {
        Self {
            name: "System.Runtime".to_string(),
            major_version: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BraceStyle {
    #[default]
    NextLine,
    EndOfLine,
}

/// Formatting rules handed to the decompiler unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattingOptions {
    #[serde(default = "default_indent")]
    pub indent: String,

    #[serde(default = "default_newline")]
    pub newline: String,

    #[serde(default)]
    pub brace_style: BraceStyle,
}

fn default_indent() -> String {
    "\t".to_string()
}

fn default_newline() -> String {
    "\n".to_string()
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            newline: default_newline(),
            brace_style: BraceStyle::NextLine,
        }
    }
}

/// Main setup configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupConfig {
    /// Client module, ignored in server-only mode
    #[serde(default)]
    pub client: Option<ModuleInput>,

    /// Server module
    #[serde(default)]
    pub server: Option<ModuleInput>,

    /// Directory searched for dependencies not embedded in a module
    #[serde(default)]
    pub search_dir: Option<PathBuf>,

    /// Output source tree, recreated on every run
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Debug working directory written to the local-environment descriptors
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Worker threads; 0 uses every available core, 1 runs sequentially
    #[serde(default)]
    pub max_parallelism: usize,

    /// Only process the server module (default: false)
    #[serde(default)]
    pub server_only: bool,

    /// Which module wins when both plan the same file
    #[serde(default)]
    pub precedence: Precedence,

    #[serde(default)]
    pub runtime: BaseRuntime,

    #[serde(default)]
    pub formatting: FormattingOptions,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("src/decompiled")
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            client: None,
            server: None,
            search_dir: None,
            out_dir: default_out_dir(),
            working_dir: None,
            max_parallelism: 0,
            server_only: false,
            precedence: Precedence::ClientFirst,
            runtime: BaseRuntime::default(),
            formatting: FormattingOptions::default(),
        }
    }
}

/// Values given on the command line; `None` leaves the file value in place
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub client_path: Option<PathBuf>,
    pub client_version: Option<Version>,
    pub server_path: Option<PathBuf>,
    pub server_version: Option<Version>,
    pub search_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub max_parallelism: Option<usize>,
    pub server_only: Option<bool>,
    pub precedence: Option<Precedence>,
}

impl SetupConfig {
    /// Load configuration from a JSON or YAML file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SetupError::io(path, e))?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| SetupError::Config(e.to_string()))
        } else {
            serde_json::from_str(&content).map_err(|e| SetupError::Config(e.to_string()))
        }
    }

    /// Create a default configuration and write it to a file
    pub fn init_file(path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&SetupConfig::default())
            .map_err(|e| SetupError::Config(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| SetupError::io(path, e))
    }

    /// Apply CLI overrides on top of this configuration
    pub fn merge(&mut self, overrides: &CliOverrides) {
        merge_input(
            &mut self.client,
            overrides.client_path.as_ref(),
            overrides.client_version,
        );
        merge_input(
            &mut self.server,
            overrides.server_path.as_ref(),
            overrides.server_version,
        );

        if let Some(dir) = &overrides.search_dir {
            self.search_dir = Some(dir.clone());
        }
        if let Some(dir) = &overrides.out_dir {
            self.out_dir = dir.clone();
        }
        if let Some(dir) = &overrides.working_dir {
            self.working_dir = Some(dir.clone());
        }
        if let Some(n) = overrides.max_parallelism {
            self.max_parallelism = n;
        }
        if let Some(server_only) = overrides.server_only {
            self.server_only = server_only;
        }
        if let Some(precedence) = overrides.precedence {
            self.precedence = precedence;
        }
    }

    /// Check that every module the run needs is configured
    pub fn validate(&self) -> Result<()> {
        if self.server.is_none() {
            return Err(SetupError::Config("no server module configured".to_string()));
        }
        if !self.server_only && self.client.is_none() {
            return Err(SetupError::Config(
                "no client module configured (use serverOnly to skip it)".to_string(),
            ));
        }
        Ok(())
    }
}

fn merge_input(slot: &mut Option<ModuleInput>, path: Option<&PathBuf>, version: Option<Version>) {
    match (slot.as_mut(), path) {
        (Some(input), _) => {
            if let Some(path) = path {
                input.path = path.clone();
            }
            if let Some(version) = version {
                input.version = version;
            }
        }
        (None, Some(path)) => {
            *slot = Some(ModuleInput {
                path: path.clone(),
                version: version.unwrap_or_default(),
            });
        }
        (None, None) => {}
    }
}

/// Hash the configuration to stamp the output manifest
pub fn hash_config(config: &SetupConfig) -> String {
    // Serializing plain data to a string does not fail
    let json = serde_json::to_string(config).unwrap_or_default();
    blake3::hash(json.as_bytes()).to_hex().to_string()
}
