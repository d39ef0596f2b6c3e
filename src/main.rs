//! `poseflow` CLI - serve the pose API or process videos locally

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use poseflow::AppConfig;

#[derive(Parser)]
#[command(name = "poseflow")]
#[command(about = "Pose-estimation video backend: draws skeletons onto videos")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/poseflow/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Render pose overlays onto a local video file
    Process {
        /// Input video
        input: PathBuf,

        /// Where to write the rendered video
        output: PathBuf,

        /// Minimum person score to draw (0.0-1.0)
        #[arg(short = 't', long, default_value = "0.2")]
        score_threshold: f32,
    },

    /// Check that ffmpeg, ffprobe, the model and storage are usable
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Commands::Serve { bind } => {
            cmd::serve::cmd_serve(config, bind).await?;
        }
        Commands::Process {
            input,
            output,
            score_threshold,
        } => {
            cmd::process::cmd_process(&config, &input, &output, score_threshold).await?;
        }
        Commands::Check => {
            cmd::check::cmd_check(&config).await?;
        }
    }

    Ok(())
}
