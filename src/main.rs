use std::path::PathBuf;

use clap::Parser;
use logfetch_core::config::Settings;

#[derive(Parser)]
#[command(name = "logfetch", version, about = "Log Fetcher: newest-first log lines over HTTP")]
struct Cli {
    /// TOML config file layered over the built-in defaults (LF_* env vars win).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Log filter, e.g. `debug` or `logfetch_core=trace`. RUST_LOG wins.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .init();
    tracing::info!(
        "logfetch v{} {}",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_DESCRIPTION")
    );

    let settings = settings.validate()?;
    logfetch::server::serve(settings).await
}
