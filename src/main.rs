// gitreleases service entry point.
// Wires configuration, the GitHub client, cache, and HTTP server together.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gitreleases::cache::TtlCache;
use gitreleases::config::Config;
use gitreleases::github::GitHubClient;
use gitreleases::resolver::ReleaseResolver;
use gitreleases::server::{self, AppState, BasicCredentials};

/// Time open requests get to finish after a termination signal.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("starting up application");

    let config = Config::parse();

    let metrics = server::metrics::install_recorder()?;
    let client = GitHubClient::new(&config.graphql_endpoint, &config.github_token)?;
    let (cache, sweeper) = TtlCache::spawn(config.cache_config());
    let resolver = ReleaseResolver::new(Arc::new(client), cache);

    let state = AppState::new(
        resolver,
        config.request_timeout(),
        metrics,
        BasicCredentials::new(&config.metrics_username, &config.metrics_password),
    );

    let addr = config.bind_addr();
    let listener = server::bind(&addr).await?;
    info!(addr = %addr, endpoint = %config.graphql_endpoint, "listening");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(server::serve(
        listener,
        server::router(state),
        async move {
            let _ = shutdown_rx.await;
        },
    ));

    let signal = tokio::select! {
        signal = shutdown_signal() => signal,
        result = &mut server => {
            sweeper.shutdown().await;
            return match result {
                Ok(Ok(())) => {
                    info!("server closed");
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!(error = %e, "cannot run server");
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            };
        }
    };

    info!(signal, "termination signal received");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(Ok(Ok(()))) => info!("server shut down properly"),
        Ok(Ok(Err(e))) => warn!(error = %e, "server shutdown with problems"),
        Ok(Err(e)) => warn!(error = %e, "server task failed during shutdown"),
        Err(_) => {
            warn!(
                grace_ms = SHUTDOWN_GRACE.as_millis() as u64,
                "grace period elapsed, dropping open connections"
            );
            server.abort();
        }
    }

    sweeper.shutdown().await;
    Ok(())
}

/// Wait for SIGINT or SIGTERM and name the one received.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
