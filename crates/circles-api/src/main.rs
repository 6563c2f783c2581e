//! # circles-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for the gift circles API.
//! Binds to configurable port (default 8080).

use std::sync::Arc;

use anyhow::Context;
use circles_api::state::{AppConfig, AppState, WhitelistConfig};
use circles_chain::{HttpSettlementClient, HttpWhitelistSource};
use circles_ledger::{Ledger, StaticWhitelistSource, WhitelistOracle, WhitelistSource};
use metrics_exporter_prometheus::PrometheusBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("loading configuration")?;
    tracing::info!(?config, "configuration loaded");

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("installing Prometheus recorder")?;

    let settlement = HttpSettlementClient::new(config.settlement.clone())
        .context("building settlement client")?;
    let ledger = Ledger::new(
        Arc::new(settlement),
        config.ledger_config().context("invalid fee configuration")?,
    );

    let source: Arc<dyn WhitelistSource> = match &config.whitelist {
        WhitelistConfig::Remote(url) => {
            tracing::info!(%url, "whitelist fetched from remote source");
            Arc::new(
                HttpWhitelistSource::new(url.clone(), config.settlement_http_timeout())
                    .context("building whitelist client")?,
            )
        }
        WhitelistConfig::Static(addresses) => {
            if addresses.is_empty() {
                tracing::warn!("no whitelist configured; every mutating request will be refused");
            }
            Arc::new(StaticWhitelistSource::new(addresses.clone()))
        }
    };
    let whitelist = Arc::new(
        WhitelistOracle::new(source, config.whitelist_ttl)
            .with_failure_backoff(config.whitelist_failure_backoff),
    );
    let cached = whitelist.refresh().await;
    tracing::info!(addresses = cached, "initial whitelist loaded");

    let state = AppState::new(ledger, whitelist).with_metrics(metrics);
    let app = circles_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("circles API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Structured logging: `RUST_LOG` filter (default `info`), JSON lines when
/// `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
