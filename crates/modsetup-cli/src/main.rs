use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use modsetup_core::config::{CliOverrides, Precedence, SetupConfig};
use modsetup_core::di::Container;
use modsetup_core::module::Version;
use modsetup_core::orchestrator::SetupTask;
use modsetup_core::scheduler::CancellationToken;

/// Default configuration file looked up in the current directory
const DEFAULT_CONFIG: &str = "modsetup.json";

/// modsetup - Prepare a decompiled source tree for client and server modules
#[derive(Parser, Debug, Clone)]
#[command(name = "modsetup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a modsetup.json or modsetup.yaml configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Client module to decompile
    #[arg(long, value_name = "FILE")]
    client: Option<PathBuf>,

    /// Version the client module must declare
    #[arg(long, value_name = "VERSION")]
    client_version: Option<Version>,

    /// Server module to decompile
    #[arg(long, value_name = "FILE")]
    server: Option<PathBuf>,

    /// Version the server module must declare
    #[arg(long, value_name = "VERSION")]
    server_version: Option<Version>,

    /// Directory searched for dependencies a module does not embed
    #[arg(long, value_name = "DIR")]
    search_dir: Option<PathBuf>,

    /// Output directory for the source tree (recreated on every run)
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Debug working directory written to the .user descriptors
    #[arg(long, value_name = "DIR")]
    working_dir: Option<PathBuf>,

    /// Worker threads (0 = all cores, 1 = sequential)
    #[arg(short = 'j', long, value_name = "N")]
    parallelism: Option<usize>,

    /// Only process the server module
    #[arg(long)]
    server_only: bool,

    /// Module that wins a path both plan (client, server)
    #[arg(long, value_name = "MODULE")]
    precedence: Option<Precedence>,

    /// Write a default modsetup.json and exit
    #[arg(long)]
    init: bool,
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for detailed logs
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    if cli.init {
        init_config()?;
        return Ok(());
    }

    let config = load_config(&cli)?;
    if let Err(e) = config.validate() {
        eprintln!("Error: {}. Use --help for usage information.", e);
        std::process::exit(1);
    }

    info!("Output directory: {}", config.out_dir.display());
    debug!("Precedence: {:?}", config.precedence);
    debug!("Parallelism: {}", config.max_parallelism);

    let task = SetupTask::new(Container::new(config));
    match task.run(&CancellationToken::new()) {
        Ok(summary) => {
            for module in &summary.modules {
                println!(
                    "{}: {} planned, {} written",
                    module.name, module.planned, module.claimed
                );
            }
            println!(
                "Wrote {} files ({} work items)",
                summary.files.len(),
                summary.report.completed
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_config() -> anyhow::Result<()> {
    let path = Path::new(DEFAULT_CONFIG);
    if path.exists() {
        anyhow::bail!("{} already exists", DEFAULT_CONFIG);
    }

    SetupConfig::init_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", DEFAULT_CONFIG, e))?;
    println!("Created {}", DEFAULT_CONFIG);
    Ok(())
}

/// Load configuration from file (if any) and apply command-line overrides
fn load_config(cli: &Cli) -> anyhow::Result<SetupConfig> {
    let mut config = if let Some(ref path) = cli.config {
        SetupConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config file: {}", e))?
    } else {
        let default_path = PathBuf::from(DEFAULT_CONFIG);
        if default_path.exists() {
            SetupConfig::from_file(&default_path)
                .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", DEFAULT_CONFIG, e))?
        } else {
            SetupConfig::default()
        }
    };

    let overrides = CliOverrides {
        client_path: cli.client.clone(),
        client_version: cli.client_version,
        server_path: cli.server.clone(),
        server_version: cli.server_version,
        search_dir: cli.search_dir.clone(),
        out_dir: cli.out_dir.clone(),
        working_dir: cli.working_dir.clone(),
        max_parallelism: cli.parallelism,
        server_only: cli.server_only.then_some(true),
        precedence: cli.precedence,
    };
    config.merge(&overrides);

    Ok(config)
}
