#![deny(unsafe_code)]

//! livelink CLI: send and query OSC messages against a Live remote script.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use livelink_config::AppConfig;
use livelink_core::{Completion, Correlator, OscArg, OscMessage, Query};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// livelink: talk OSC to Ableton Live.
#[derive(Parser)]
#[command(
    name = "livelink",
    version,
    long_version = livelink_core::build_info::LONG_VERSION,
    about,
    long_about = None
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "livelink.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message without waiting for a reply.
    Send {
        /// OSC address, e.g. /live/play.
        address: String,

        /// Arguments: ints, floats, true/false, or strings.
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Send a request and print the reply.
    Query {
        /// OSC address, e.g. /live/tempo.
        address: String,

        /// Arguments: ints, floats, true/false, or strings.
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,

        /// Address the reply arrives on, when it differs from the request.
        #[arg(long)]
        response_address: Option<String>,

        /// Override the configured reply timeout.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout_ms: Option<u64>,

        /// Print the reply values as a JSON array.
        #[arg(long)]
        json: bool,
    },

    /// Print a line for every beat notification.
    Beats {
        /// Exit after this many beats.
        #[arg(long)]
        count: Option<u64>,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config).await?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, &config))),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!("{}", livelink_core::build_info::version_string());
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }

    match cli.command {
        Commands::Send { address, args } => cmd_send(&config, address, &args).await?,
        Commands::Query {
            address,
            args,
            response_address,
            timeout_ms,
            json,
        } => {
            if let Some(ms) = timeout_ms {
                config.query.timeout_ms = ms;
            }
            let mut query = Query::new(address).args(args.iter().map(|a| parse_arg(a)));
            if let Some(reply) = response_address {
                query = query.respond_on(reply);
            }
            cmd_query(&config, query, json).await?
        }
        Commands::Beats { count } => cmd_beats(&config, count).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

/// Log filter for the given `-v` count, falling back to the configured level.
fn log_filter(verbose: u8, config: &AppConfig) -> String {
    match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

async fn connect(config: &AppConfig) -> Result<Correlator> {
    Correlator::from_config(config)
        .await
        .context("failed to set up OSC sockets")
}

async fn cmd_send(config: &AppConfig, address: String, args: &[String]) -> Result<()> {
    let correlator = connect(config).await?;
    let message = OscMessage::new(address).args(args.iter().map(|a| parse_arg(a)));
    correlator.send(message).await?;
    correlator.stop().await;
    Ok(())
}

async fn cmd_query(config: &AppConfig, query: Query, json: bool) -> Result<()> {
    let correlator = connect(config).await?;
    let address = query.expected_address().to_string();
    let outcome = correlator.request_detailed(query).await?;
    correlator.stop().await;

    if json {
        println!("{}", serde_json::to_string(&outcome.values)?);
    } else {
        for value in &outcome.values {
            println!("{value}");
        }
    }

    if outcome.completion != Completion::Answered {
        bail!(
            "no response on {address} within {}ms",
            config.query.timeout_ms
        );
    }
    Ok(())
}

async fn cmd_beats(config: &AppConfig, count: Option<u64>) -> Result<()> {
    let correlator = connect(config).await?;
    let listen = correlator
        .start()
        .await
        .context("failed to listen for beats")?;
    info!(addr = %listen, beat = %config.query.beat_address, "waiting for beats");

    let (tx, mut rx) = mpsc::unbounded_channel();
    correlator.register_beat_callback(move || {
        let _ = tx.send(());
    });

    let mut seen = 0u64;
    loop {
        tokio::select! {
            beat = rx.recv() => {
                if beat.is_none() {
                    break;
                }
                seen += 1;
                println!("beat {seen}");
                if count.is_some_and(|n| seen >= n) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    correlator.clear_beat_callback();
    correlator.stop().await;
    Ok(())
}

fn cmd_config(path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("failed to render config")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path)
            .await
            .with_context(|| format!("invalid config at '{}'", path.display()))
    } else {
        Ok(AppConfig::default())
    }
}

/// Type a command-line argument: int, then finite float, then bool, else string.
fn parse_arg(raw: &str) -> OscArg {
    if let Ok(i) = raw.parse::<i32>() {
        OscArg::Int(i)
    } else if let Some(f) = raw.parse::<f32>().ok().filter(|f| f.is_finite()) {
        OscArg::Float(f)
    } else {
        match raw {
            "true" => OscArg::Bool(true),
            "false" => OscArg::Bool(false),
            _ => OscArg::Str(raw.to_string()),
        }
    }
}
