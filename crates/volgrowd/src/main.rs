//! volgrowd — drives root-volume growth.
//!
//! Runs the resize pipeline (initiate → poll → expand) against an
//! in-memory backend seeded from a fleet file, or computes a dry-run size
//! plan.
//!
//! # Usage
//!
//! ```text
//! volgrowd plan --current-size 100 --growth-percent 20 --max-size-gib 200
//! volgrowd run --fleet fleet.toml --config volgrow.toml
//! volgrowd state --fleet fleet.toml --volume-id vol-0root
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr.

mod fleet;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use volgrow_core::{GrowthConfig, PipelineContext, VolgrowConfig};
use volgrow_driver::{DriverError, Pipeline};

use crate::fleet::Fleet;

const DEFAULT_FILTER: &str =
    "info,volgrowd=debug,volgrow_core=debug,volgrow_resize=debug,volgrow_driver=debug";

#[derive(Parser)]
#[command(name = "volgrowd", about = "Grow a root volume and its filesystem")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the target size for a volume without touching any backend.
    Plan {
        /// Current volume size in GiB.
        #[arg(long)]
        current_size: u32,

        /// Growth in percent.
        #[arg(long, default_value = "20")]
        growth_percent: f64,

        /// Size ceiling in GiB.
        #[arg(long, default_value = "16384")]
        max_size_gib: u32,
    },

    /// Run the resize pipeline against a simulated fleet.
    Run {
        /// Fleet file seeding the in-memory backend.
        #[arg(long)]
        fleet: PathBuf,

        /// Configuration file (volgrow.toml). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Instance to grow. Overrides the file and INSTANCE_ID.
        #[arg(long)]
        instance_id: Option<String>,

        /// Resume from a persisted pipeline context (JSON).
        #[arg(long)]
        resume: Option<PathBuf>,
    },

    /// Report a volume's modification state once.
    State {
        #[arg(long)]
        fleet: PathBuf,

        #[arg(long)]
        volume_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Plan {
            current_size,
            growth_percent,
            max_size_gib,
        } => plan(current_size, growth_percent, max_size_gib),
        Command::Run {
            fleet,
            config,
            instance_id,
            resume,
        } => run(fleet, config, instance_id, resume).await,
        Command::State { fleet, volume_id } => state(fleet, &volume_id).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn plan(current_size: u32, growth_percent: f64, max_size_gib: u32) -> anyhow::Result<()> {
    let growth = GrowthConfig {
        growth_percent,
        max_size_gib,
        ..GrowthConfig::default()
    };
    growth.validate()?;

    let target = volgrow_resize::target_size(current_size, growth_percent, max_size_gib);
    let report = serde_json::json!({
        "current_size": current_size,
        "new_size": target,
        "resize": target > current_size,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run(
    fleet: PathBuf,
    config_path: Option<PathBuf>,
    instance_id: Option<String>,
    resume: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = match &config_path {
        Some(path) => VolgrowConfig::from_file(path)?,
        None => VolgrowConfig::default(),
    };
    config.growth = config.growth.with_process_env()?;
    if let Some(id) = instance_id {
        config.growth.instance_id = Some(id);
    }
    config.validate()?;

    let cloud = Fleet::from_file(&fleet)?.into_cloud().await;
    info!(fleet = ?fleet, config = ?config_path, "backend seeded");

    let pipeline = Pipeline::new(cloud.clone(), cloud, config);
    let result = match resume {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading context {}", path.display()))?;
            let ctx: PipelineContext = serde_json::from_str(&content)
                .with_context(|| format!("parsing context {}", path.display()))?;
            pipeline.resume(ctx).await
        }
        None => pipeline.run().await,
    };

    let ctx = match result {
        Ok(ctx) => ctx,
        Err(e) => {
            if is_retryable(&e) {
                warn!(error = %e, "pipeline aborted on a conflicting modification, retry later");
            }
            return Err(e.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&ctx)?);
    Ok(())
}

async fn state(fleet: PathBuf, volume_id: &str) -> anyhow::Result<()> {
    let cloud = Fleet::from_file(&fleet)?.into_cloud().await;
    let record = volgrow_resize::check_state(&cloud, volume_id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Whether re-running the pipeline later could succeed.
fn is_retryable(err: &DriverError) -> bool {
    match err {
        DriverError::Step(e) => e.is_retryable(),
        DriverError::RetriesExhausted { last, .. } => last.is_retryable(),
        DriverError::PollExhausted { .. } => true,
        DriverError::ModificationFailed { .. } | DriverError::MissingVolume { .. } => false,
    }
}
