//! Tender board backend entry point.
//!
//! Starts a background task that keeps the tender board refreshed from the
//! ledger and exposes a small Axum REST API over it.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use orchestrator::api::{self, ApiState};
use orchestrator::config::{Config, ContentStoreKind};
use orchestrator::ledger::rpc::JsonRpcLedger;
use orchestrator::ledger::LedgerGateway;
use orchestrator::metadata::sqlite::SqliteContentStore;
use orchestrator::metadata::store::GatewayStore;
use orchestrator::metadata::{ContentStore, MetadataCache};
use orchestrator::refresh::{self, BoardState};
use orchestrator::service::TenderService;
use orchestrator::session::NetworkPolicy;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    // HTTP client shared by the ledger transport and the content gateway.
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    // ─── Ledger ───────────────────────────────────────────
    let contracts: HashMap<_, _> = config
        .supported_networks
        .iter()
        .map(|n| (*n, config.contract_address.to_string()))
        .collect();
    let backend = Arc::new(JsonRpcLedger::new(client.clone(), config.rpc_url.clone(), contracts));
    let policy = NetworkPolicy::new(config.supported_networks.clone())?;
    let timings = config.timings();
    let retry_delay = timings.retry_delay;
    let gateway = Arc::new(LedgerGateway::new(backend, policy, timings));

    // ─── Off-chain content ────────────────────────────────
    let store: Arc<dyn ContentStore> = match config.content_store {
        ContentStoreKind::Gateway => Arc::new(GatewayStore::new(
            client,
            config.ipfs_gateway.clone(),
            config.pinata_api_url.clone(),
            config.pinata_jwt.clone(),
        )),
        ContentStoreKind::Sqlite => {
            let local = SqliteContentStore::connect(&config.database_url).await?;
            info!("Local content store holds {} documents", local.count().await?);
            Arc::new(local)
        }
    };
    let cache = Arc::new(MetadataCache::new(store, retry_delay));
    let service = Arc::new(TenderService::new(gateway, cache));

    // ─── Background refresh ───────────────────────────────
    let board = Arc::new(BoardState::new(
        service.clone(),
        config.network_id,
        config.refresh_interval(),
    ));
    let token = CancellationToken::new();
    let refresher = tokio::spawn(refresh::run(board.clone(), token.clone()));

    // ─── REST API ─────────────────────────────────────────
    let app = api::router(Arc::new(ApiState { board, service }));

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let shutdown = token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            shutdown.cancel();
        })
        .await?;

    token.cancel();
    refresher.await?;
    Ok(())
}
