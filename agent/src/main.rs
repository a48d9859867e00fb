//! syscap agent
//!
//! Replays recorded syscall exits through the filter pipeline and suppression
//! engine, or attaches the kernel exit program and streams kept events.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use syscap_agent::{metrics, run_attach, run_replay, AgentConfig};

#[derive(Parser, Debug)]
#[command(name = "syscap-agent")]
#[command(about = "Syscall exit capture with prefix filtering and suppression", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Write Prometheus metrics to this file on exit
    #[arg(long, global = true)]
    metrics: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run recorded exit events (JSON lines) through the pipeline
    Replay {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Recorded events, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Where kept events go (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Attach the kernel exit program and stream kept events to stdout
    Attach {
        /// Configuration file (TOML); reloaded on SIGHUP
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Compiled eBPF object
        #[arg(long, env = "SYSCAP_EBPF_OBJECT")]
        ebpf_object: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose)?;

    info!("Starting syscap agent");

    let result = run(args.command).await;

    if let Some(path) = &args.metrics {
        if let Err(e) = std::fs::write(path, metrics::encode_metrics()) {
            warn!("Failed to write metrics to {}: {}", path.display(), e);
        }
    }
    result
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Replay {
            config,
            input,
            output,
        } => {
            let config = AgentConfig::load(config.as_deref())?;
            let file = tokio::fs::File::open(&input)
                .await
                .with_context(|| format!("Failed to open {}", input.display()))?;
            let input = BufReader::new(file);

            let stats = match output {
                Some(path) => {
                    let file = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    run_replay(&config, input, file).await?
                }
                None => run_replay(&config, input, tokio::io::stdout()).await?,
            };
            info!("{:?}", stats);
            Ok(())
        }
        Command::Attach {
            config,
            ebpf_object,
        } => {
            // Check if running as root (required for eBPF)
            if !nix::unistd::Uid::effective().is_root() {
                warn!("Warning: Not running as root. eBPF programs require root privileges.");
                warn!("Try: sudo {}", std::env::current_exe()?.display());
            }
            run_attach(config.as_deref(), ebpf_object.as_deref()).await
        }
        Command::Config { config } => {
            let config = AgentConfig::load(config.as_deref())?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries events
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}
