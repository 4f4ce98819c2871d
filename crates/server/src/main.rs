//! repute server entry point.
//!
//! Boots the lookup queue and serves the MCP tool surface on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use repute_client::{EngineSettings, GeminiClient, QueryEngine, ReputationLookup};
use repute_core::{AppConfig, CacheDb, SourceRegistry};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod events;
mod handler;
mod scheduler;
mod sink;
mod status;
mod tools;

use scheduler::{RetryPolicy, Scheduler};
use sink::{ResultSink, TabBoard};
use status::StatusBroadcaster;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(model = %config.model, db_path = %config.db_path.display(), "Starting repute server on stdio transport");

    let db = CacheDb::open(&config.db_path).await?.with_ttl(config.cache_ttl());
    let pruned = db.prune_expired().await?;
    tracing::info!(pruned, "pruned expired cache entries");

    let registry = SourceRegistry::new(db.clone(), config.default_sources.clone());

    let lookup = match GeminiClient::from_app(&config) {
        Ok(client) => Some(Arc::new(client) as Arc<dyn ReputationLookup>),
        Err(e) => {
            tracing::warn!(error = %e, "lookups disabled");
            None
        }
    };

    let engine = QueryEngine::new(lookup, db, registry, EngineSettings::from(&config));

    let status = StatusBroadcaster::new();
    status.spawn_logger();

    let board = Arc::new(TabBoard::new());
    let scheduler = Scheduler::new(engine, board.clone() as Arc<dyn ResultSink>, status, RetryPolicy::default());

    let handler = handler::ReputeServer::new(scheduler, board);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
