use clap::Parser;
use tokio::signal;
use tolk_config::Config;
use tolk_config::log::{LogConfig, LogFormat};
use tolk_proxy::ProxyWorker;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod controller;
mod events;
mod history;
mod state;


use self::cli::Cli;
use self::controller::AppController;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::new();

    init_tracing(&config.log);
    tracing::info!("Starting tolk");

    let controller = AppController::new(config);
    let mut tasks = controller.spawn_tasks(ProxyWorker::new());
    let state = controller.state();
    state.prepare().await;

    let result = tokio::select! {
        result = commands::run(state, cli.command, controller.cancel_token()) => result,
        _ = signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
            Ok(())
        }
    };

    controller.shutdown();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task exited with error: {e}"),
            Err(e) => tracing::error!("task panicked: {e}"),
        }
    }

    result
}

/// Logs go to stderr, stdout belongs to command output and the message host
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder
            .with_ansi(atty::is(atty::Stream::Stderr))
            .init(),
    }
}
