//! `stowage relay`: import marketplace orders into the backend.
//!
//! # Environment Variables
//!
//! See `stowage_client::config` for the full list; `MARKETPLACE_API_URL`,
//! `MARKETPLACE_API_KEY`, `STOWAGE_API_URL` and `STOWAGE_AUTH` are required.

use tracing::{info, warn};

use stowage_client::{MarketplaceRelay, RelayConfig};

fn relay() -> Result<MarketplaceRelay, Box<dyn std::error::Error>> {
    let config = RelayConfig::from_env()?;
    info!(
        marketplace = %config.marketplace_url,
        backend = %config.backend_url,
        "Relay configured"
    );
    Ok(MarketplaceRelay::new(config)?)
}

/// Refresh the backend token, then run a single relay pass.
///
/// A failed refresh falls back to the stored token.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the pass fails.
pub async fn once() -> Result<(), Box<dyn std::error::Error>> {
    let relay = relay()?;

    if let Err(e) = relay.refresh_token().await {
        warn!(error = %e, "Token refresh failed; using stored token");
    }

    let report = relay.run_once().await?;
    super::emit(&format!(
        "pages fetched: {}, orders created: {}\n",
        report.pages, report.orders_created
    ))?;
    Ok(())
}

/// Poll until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if configuration is invalid.
pub async fn scheduled() -> Result<(), Box<dyn std::error::Error>> {
    let relay = relay()?;
    info!("Relay started");
    relay.run_scheduled(shutdown_signal()).await;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, stopping relay");
}
