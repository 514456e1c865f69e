//! Trivia server binary: configuration from `TRIVIA_*` variables, logs
//! filtered by `RUST_LOG`.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trivia_server::{ServerConfig, ServerError, TriviaServer};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    init_tracing();

    let config = ServerConfig::from_env();
    let store = config.load_store()?;
    info!(
        bind = %config.bind_addr,
        round_secs = config.room.round_time.as_secs(),
        max_players = config.room.max_players,
        "starting trivia server"
    );

    let server = TriviaServer::builder().config(config).build(store).await?;
    server.run_until(shutdown_signal()).await
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
