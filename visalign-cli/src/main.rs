// visalign command line interface
// Drives a robot into visual alignment from scripted detector output

mod config_store;
mod script;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use config_store::ConfigStore;
use script::FrameScript;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use visalign_core::{Command, ConfigFormat, RobotConfig};
use visalign_ctl::{AlignmentController, ControllerConfig, ModeContext, RepeatMode};
use visalign_link::{MemoryLog, RobotLink};

#[derive(Parser)]
#[command(name = "visalign")]
#[command(about = "Visual alignment driver for robot controllers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (.json or .toml)
    #[arg(long, short, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Override the robot host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Override the robot port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Record commands in memory instead of opening a socket
    #[arg(long, global = true)]
    dry_run: bool,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a frame script (JSON Lines) through the controller
    Run {
        /// Script path, or `-` for stdin
        #[arg(long, short, default_value = "-")]
        script: String,

        /// Skip head (rz) alignment
        #[arg(long)]
        no_rz: bool,

        /// What to do after an object is aligned
        #[arg(long, value_enum, default_value = "single")]
        repeat: RepeatArg,

        /// Arm the first cycle without waiting for a reset event
        #[arg(long)]
        armed: bool,
    },

    /// Send a single command token
    Send {
        /// Token such as `left`, `stopz` or `rzP`
        token: String,

        /// Send the token as-is, even if it is not a known command
        #[arg(long)]
        raw: bool,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RepeatArg {
    Single,
    Continuous,
}

impl From<RepeatArg> for RepeatMode {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::Single => RepeatMode::Single,
            RepeatArg::Continuous => RepeatMode::Continuous,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            ref script,
            no_rz,
            repeat,
            armed,
        } => {
            let config = load_config(&cli)?;
            let mode = ModeContext::new(!no_rz, repeat.into());
            run_script(&cli, config, script, mode, armed).await?;
        }
        Commands::Send { ref token, raw } => {
            let config = load_config(&cli)?;
            send_once(&cli, &config, token, raw).await?;
        }
        Commands::Config(ConfigCommands::Show) => {
            let config = load_config(&cli)?;
            println!("{}", config.render(ConfigFormat::from_path(&cli.config))?);
        }
        Commands::Config(ConfigCommands::Init { force }) => {
            if cli.config.exists() && !force {
                anyhow::bail!("{} already exists, pass --force to overwrite", cli.config.display());
            }
            ConfigStore::save(&cli.config, &RobotConfig::default())?;
            println!("Wrote default configuration to {}", cli.config.display());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<RobotConfig> {
    let mut config = ConfigStore::load_or_init(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Some(host) = &cli.host {
        config.robot_host = host.clone();
    }
    if let Some(port) = cli.port {
        config.robot_port = port;
    }

    config.validate()?;
    Ok(config)
}

/// Open the link; dry runs also hand back the log their commands land in
fn open_link(cli: &Cli, config: &RobotConfig) -> (Arc<RobotLink>, Option<MemoryLog>) {
    let (link, log) = if cli.dry_run {
        info!("Dry run, commands are recorded in memory");
        let (link, log) = RobotLink::memory();
        (link, Some(log))
    } else {
        (RobotLink::tcp(config.connect_timeout()), None)
    };
    debug!("Using {:?} transport", link.transport_type());
    (Arc::new(link), log)
}

/// Report and drain what a dry run recorded, returning the token count
fn flush_dry_run(log: Option<&MemoryLog>) -> usize {
    let Some(log) = log else { return 0 };
    let tokens = log.take_delivered();
    if !tokens.is_empty() {
        info!("Dry run recorded: {}", tokens.join(" "));
    }
    tokens.len()
}

async fn run_script(
    cli: &Cli,
    config: RobotConfig,
    source: &str,
    mode: ModeContext,
    armed: bool,
) -> anyhow::Result<()> {
    let (link, dry_run) = open_link(cli, &config);
    let mut recorded = 0usize;
    if link.connect(config.endpoint()).await.is_err() {
        warn!("Starting without a robot connection; send a connect event to retry");
    }

    let mut controller = AlignmentController::new(link.clone(), ControllerConfig::from(&config));
    if armed {
        controller.reset_alignment();
    }
    let mut frames = FrameScript::new(controller, &config, mode);

    let reader: Box<dyn tokio::io::AsyncRead + Unpin + Send> = if source == "-" {
        Box::new(tokio::io::stdin())
    } else {
        Box::new(
            tokio::fs::File::open(source)
                .await
                .with_context(|| format!("opening script {}", source))?,
        )
    };
    let mut lines = BufReader::new(reader).lines();
    let mut line_number = 0usize;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                line_number += 1;
                if let Err(e) = frames.apply_line(&line).await {
                    warn!("Skipping script line {}: {}", line_number, e);
                }
                recorded += flush_dry_run(dry_run.as_ref());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    link.disconnect().await;
    recorded += flush_dry_run(dry_run.as_ref());

    let summary = frames.summary();
    let stats = link.stats();
    info!(
        "Processed {} frames, {} commands sent ({} delivered, {} failed, {} reconnects), {} resets ({} refused)",
        summary.frames,
        summary.commands,
        stats.sent,
        stats.failed,
        stats.reconnects,
        summary.resets,
        summary.refused_resets,
    );
    if dry_run.is_some() {
        info!("Dry run recorded {} tokens in total", recorded);
    }
    debug!("Final alignment state: {:?}", frames.controller().state());
    Ok(())
}

async fn send_once(cli: &Cli, config: &RobotConfig, token: &str, raw: bool) -> anyhow::Result<()> {
    if !raw {
        token.parse::<Command>()?;
    } else if token.parse::<Command>().is_err() {
        warn!("{:?} is not a known command, sending it anyway", token);
    }
    let (link, dry_run) = open_link(cli, config);

    link.connect(config.endpoint())
        .await
        .with_context(|| format!("connecting to {}", config.endpoint()))?;
    let result = link.send_raw(token).await;
    link.disconnect().await;

    result.with_context(|| format!("sending {}", token))?;
    println!("Sent {}", token);
    if let Some(log) = dry_run {
        println!("Dry run recorded: {}", log.take_delivered().join(" "));
    }
    Ok(())
}
