/*
[INPUT]:  CLI arguments, optional YAML configuration file, OS shutdown signals
[OUTPUT]: REST one-shot results or a live authenticated stream on stdout
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use codex_adapter::{CodexClient, Ed25519Signer, WebSocketSession, sign};
use codex_cli::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "codex", version, about = "Codex exchange API client")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,
    #[arg(long = "public-key", env = "CODEX_PUBLIC_KEY", hide_env_values = true, global = true)]
    public_key: Option<String>,
    #[arg(long = "secret-key", env = "CODEX_SECRET_KEY", hide_env_values = true, global = true)]
    secret_key: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the server timestamp
    Time,
    /// Print account balances
    Balances,
    /// Sign a payload with the configured secret key
    Sign {
        #[arg(value_name = "PAYLOAD")]
        payload: String,
    },
    /// Stream channels until interrupted
    Stream {
        #[arg(long = "channel", value_name = "CHANNEL")]
        channels: Vec<String>,
    },
    /// Generate a new key pair
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let mut config = load_config(args.config_path.as_ref())?;
    config.apply_key_overrides(args.public_key, args.secret_key);

    match args.command {
        Command::Time => {
            let client = CodexClient::with_config(config.client_config()).context("create client")?;
            let time = client.server_time().await.context("fetch server time")?;
            println!("{time}");
        }
        Command::Balances => {
            let client = CodexClient::with_config(config.client_config())
                .context("create client")?
                .with_credentials(config.credentials()?);
            let balances = client.balances().await.context("fetch balances")?;
            println!("{}", serde_json::to_string_pretty(&balances)?);
        }
        Command::Sign { payload } => {
            let signature = sign(&config.api.secret_key, payload).context("sign payload")?;
            println!("{signature}");
        }
        Command::Stream { channels } => run_stream(&config, channels).await?,
        Command::Keygen => {
            let signer = Ed25519Signer::generate();
            println!("public_key: {}", signer.public_key_hex());
            println!("secret_key: {}", signer.secret_key_hex());
        }
    }

    Ok(())
}

async fn run_stream(config: &CliConfig, extra_channels: Vec<String>) -> Result<()> {
    let session = WebSocketSession::new(config.session_config()?, config.credentials()?);
    for channel in config.stream.channels.iter().cloned().chain(extra_channels) {
        session.subscribe(channel).await?;
    }
    if session.channels().is_empty() {
        warn!("no channels requested; only control traffic will flow");
    }

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    info!(url = %session.config().url, channels = session.channels().len(), "starting stream");
    let handle = session
        .connect(|frame| println!("{frame}"))
        .await
        .context("start websocket session")?;

    tokio::select! {
        _ = shutdown.cancelled() => {
            info!("shutdown signal received");
            session.disconnect().await.context("disconnect websocket")?;
            info!("stream stopped");
        }
        result = handle.closed() => {
            result.context("websocket session stopped")?;
        }
    }

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<CliConfig> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let path_str = path.to_str().context("config path must be valid utf-8")?;
    CliConfig::from_file(path_str).context("load config")
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
