//! PongNet server.
//!
//! Configuration comes from `PONGNET_*` environment variables, optionally
//! layered over a JSON file named by `PONGNET_CONFIG`:
//!
//!   PONGNET_BIND=0.0.0.0:7350 PONGNET_LOG=debug pongnet-server

use pongnet::telemetry::init_tracing;
use pongnet::{MemorySocial, MemoryStore, PongServer, ServerConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> pongnet::Result<()> {
    let config = ServerConfig::from_env()?;
    init_tracing(config.tracing());

    let bind_addr = config.bind_addr.clone();
    let server = PongServer::builder()
        .config(config)
        .store(Arc::new(MemoryStore::new()))
        .social(Arc::new(MemorySocial::new()))
        .build();

    let scheduler = server.spawn_scheduler();

    tokio::select! {
        result = pongnet::transport::serve(server, &bind_addr) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }

    scheduler.abort();
    Ok(())
}
