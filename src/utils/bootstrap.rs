//! Bootstrap utilities for ctxctl binaries.
//!
//! Shared initialization code for the controller and policy services.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{CONFIG_ENV_VAR, LOG_ENV_VAR};

/// Initialize tracing with the CTXCTL_LOG environment variable.
///
/// Defaults to "info" level if CTXCTL_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Config path from `--config <path>` / `--config=<path>`, else `CTXCTL_CONFIG`.
pub fn parse_config_path() -> Option<String> {
    config_path_from(std::env::args().skip(1), std::env::var(CONFIG_ENV_VAR).ok())
}

fn config_path_from<I>(args: I, env_value: Option<String>) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    env_value.filter(|v| !v.is_empty())
}

/// Cancel `token` on the first interrupt or terminate signal.
///
/// Signal delivery is only one producer of cancellation; anything holding a
/// clone of the token can trigger shutdown the same way.
pub fn shutdown_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                info!("Shutdown signal received");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for interrupt");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_config_flag() {
        assert_eq!(
            config_path_from(args(&["--config", "a.json"]), None),
            Some("a.json".to_string())
        );
        assert_eq!(
            config_path_from(args(&["--config=b.json"]), Some("env.json".to_string())),
            Some("b.json".to_string())
        );
    }

    #[test]
    fn test_config_env_fallback() {
        assert_eq!(
            config_path_from(args(&[]), Some("env.json".to_string())),
            Some("env.json".to_string())
        );
        assert_eq!(config_path_from(args(&[]), Some(String::new())), None);
        assert_eq!(config_path_from(args(&["--verbose"]), None), None);
    }

    #[tokio::test]
    async fn test_token_cancel_stops_signal_task() {
        let token = CancellationToken::new();
        shutdown_on_signal(token.clone());
        token.cancel();
        assert!(token.is_cancelled());
    }
}
