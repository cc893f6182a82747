use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tickbar::config::Config;
use tickbar::ReloadSignals;
use tokio_util::sync::CancellationToken;

/// Status command for swaybar / i3bar.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file (JSON, or TOML with a .toml extension).
    config: PathBuf,

    /// Maximum random delay used to stagger updates, e.g. "2s".
    /// Overrides the config file.
    #[arg(long)]
    jitter: Option<String>,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let mut config = Config::load(&cli.config)?;
    if let Some(jitter) = cli.jitter.clone() {
        config.jitter = Some(jitter);
    }
    let bar = config.into_bar(ReloadSignals::Os)?;

    let shutdown = CancellationToken::new();
    cancel_on_termination(shutdown.clone())?;

    let mut stdout = tokio::io::stdout();
    bar.run(&mut stdout, shutdown).await?;

    tracing::debug!("shutting down");
    Ok(())
}

/// stderr is the bar's log sink unless a file is given. `RUST_LOG` overrides
/// the default filter.
fn init_logging(cli: &Cli) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tickbar=warn"));

    match &cli.log_file {
        Some(path) => {
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(log_file)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Cancel `shutdown` on the first SIGHUP, SIGINT, SIGTERM or SIGQUIT.
#[cfg(unix)]
fn cancel_on_termination(shutdown: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hup = signal(SignalKind::hangup()).context("failed to listen for SIGHUP")?;
    let mut int = signal(SignalKind::interrupt()).context("failed to listen for SIGINT")?;
    let mut term = signal(SignalKind::terminate()).context("failed to listen for SIGTERM")?;
    let mut quit = signal(SignalKind::quit()).context("failed to listen for SIGQUIT")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = hup.recv() => {}
            _ = int.recv() => {}
            _ = term.recv() => {}
            _ = quit.recv() => {}
        }
        tracing::debug!("termination signal received");
        shutdown.cancel();
    });
    Ok(())
}

#[cfg(not(unix))]
fn cancel_on_termination(shutdown: CancellationToken) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });
    Ok(())
}
