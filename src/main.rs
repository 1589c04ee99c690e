//! Report watcher daemon
//!
//! Watches a relay for content reports and auto-hides qualifying ones.
//! Commands (`start`, `stop`, `status`) are read from stdin one per line and
//! answered on stdout as JSON; logs go to stderr.
//!
//! Besides the `WATCHER_*` variables read by [`WatcherConfig::from_env`]:
//!
//! | Variable | Default |
//! |---|---|
//! | `WATCHER_MANAGEMENT_URL` | relay URL with `ws`→`http` |
//! | `WATCHER_MANAGEMENT_AUTH` | none; sent as `Authorization` |
//! | `WATCHER_HIDE_METHOD` | `hidecontent` |
//! | `WATCHER_DATABASE_PATH` | `moderation.db` |
//! | `WATCHER_STATE_PATH` | `watcher_state.json` |

mod control;

use anyhow::{Context, Result};
use moderation::{FileStateStore, ReportWatcher, WatcherConfig, WatcherServices};
use nostr_client::{ManagementClient, ManagementClientConfig, TungsteniteConnector};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use storage::{DatabaseConfig, DecisionStore, ReviewStore, SqliteDatabase};
use tracing_subscriber::EnvFilter;

struct Settings {
    watcher: WatcherConfig,
    management_url: String,
    management_auth: Option<String>,
    hide_method: Option<String>,
    database_path: String,
    state_path: PathBuf,
}

impl Settings {
    fn from_env() -> Result<Self> {
        let watcher = WatcherConfig::from_env().context("invalid watcher configuration")?;
        let management_url = env::var("WATCHER_MANAGEMENT_URL")
            .unwrap_or_else(|_| management_url_for(&watcher.relay_url));

        Ok(Self {
            management_url,
            management_auth: env::var("WATCHER_MANAGEMENT_AUTH").ok(),
            hide_method: env::var("WATCHER_HIDE_METHOD").ok().filter(|m| !m.trim().is_empty()),
            database_path: env::var("WATCHER_DATABASE_PATH")
                .unwrap_or_else(|_| "moderation.db".to_string()),
            state_path: env::var("WATCHER_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("watcher_state.json")),
            watcher,
        })
    }
}

/// Management RPC is served over HTTP on the relay's own address
fn management_url_for(relay_url: &str) -> String {
    if let Some(rest) = relay_url.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = relay_url.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        relay_url.to_string()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    init_tracing();
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let settings = Settings::from_env()?;

    let db = SqliteDatabase::open_moderation(DatabaseConfig::new(settings.database_path.as_str()))
        .await
        .with_context(|| format!("failed to open {}", settings.database_path))?;

    let mut management_config = ManagementClientConfig::new(settings.management_url.as_str());
    if let Some(auth) = settings.management_auth {
        management_config = management_config.with_header("Authorization", auth);
    }
    let mut management = ManagementClient::new(management_config)?;
    if let Some(method) = settings.hide_method {
        management = management.with_hide_method(method);
    }

    tracing::info!(
        "Report watcher for {} (management: {} via {}, state: {})",
        settings.watcher.relay_url,
        settings.management_url,
        management.hide_method(),
        settings.state_path.display()
    );

    let services = WatcherServices::new(
        Arc::new(TungsteniteConnector::new()),
        Arc::new(management),
        Arc::new(DecisionStore::new(&db)),
        Arc::new(ReviewStore::new(&db)),
        Arc::new(FileStateStore::new(settings.state_path)),
    );
    let watcher = ReportWatcher::spawn(settings.watcher, services)?;

    tokio::select! {
        result = control::serve(&watcher, tokio::io::stdin(), tokio::io::stdout()) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    watcher.shutdown().await?;
    db.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_management_url_for() {
        assert_eq!(management_url_for("wss://relay.example"), "https://relay.example");
        assert_eq!(management_url_for("ws://localhost:7777"), "http://localhost:7777");
        assert_eq!(management_url_for("https://relay.example/rpc"), "https://relay.example/rpc");
    }
}
