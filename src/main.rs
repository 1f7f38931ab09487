//! auction-sync entry point.
//!
//! Watches the active-auction list of an auction authority chain with
//! polling and logs every change until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use tracing_subscriber::EnvFilter;

use auction_sync::app_state::AppState;
use auction_sync::client::{ApplicationClient, HttpApplicationClient};
use auction_sync::config::SyncConfig;
use auction_sync::domain::{Auction, AuctionId, AuctionStatus};
use auction_sync::hooks::{PollOptions, QueryState, use_active_auctions, use_indexer};
use auction_sync::persistence::{BootstrapRecordStore, FileRecordStore, MemoryRecordStore};

const PAGE_SIZE: usize = 50;

type Row = (AuctionId, AuctionStatus, String, u64);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = SyncConfig::from_env().map_err(|e| anyhow!("invalid configuration: {e}"))?;
    tracing::info!(node = %config.node_url, aac_chain = %config.aac_chain, "starting auction-sync");

    let client: Arc<dyn ApplicationClient> =
        Arc::new(HttpApplicationClient::new(&config).context("building node client")?);
    let records: Arc<dyn BootstrapRecordStore> = match &config.bootstrap_record_path {
        Some(path) => Arc::new(FileRecordStore::new(path.clone())),
        None => Arc::new(MemoryRecordStore::new()),
    };
    let app = AppState::new(&config, client, records);

    if config.indexer_app_id.is_some() {
        let mut indexer = use_indexer(&app);
        indexer.mount().await;
        let state = indexer.state();
        match (state.data, state.error) {
            (_, Some(e)) => tracing::warn!(error = %e, "indexer bootstrap failed"),
            (Some(indexer), None) => tracing::info!(status = ?indexer.status, "indexer ready"),
            (None, None) => {}
        }
    }

    let mut active = use_active_auctions(&app, 0, PAGE_SIZE, PollOptions::enabled());
    active.mount().await;
    let mut shown = report(&active.state(), &[]);

    loop {
        tokio::select! {
            () = active.changed() => {
                shown = report(&active.state(), &shown);
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for ctrl-c")?;
                break;
            }
        }
    }

    drop(active);
    app.shutdown();
    Ok(())
}

/// Logs rows that differ from `previous` and returns the current rows.
fn report(state: &QueryState<Vec<Arc<Auction>>>, previous: &[Row]) -> Vec<Row> {
    if let Some(e) = &state.error {
        tracing::warn!(error = %e, "active auctions fetch failed");
    }
    let rows: Vec<Row> = state
        .data
        .iter()
        .flatten()
        .map(|a| (a.id, a.status, a.current_price.clone(), a.remaining()))
        .collect();
    for row in rows.iter().filter(|row| !previous.contains(row)) {
        let (id, status, price, remaining) = row;
        tracing::info!(auction_id = %id, ?status, %price, remaining, "auction");
    }
    if rows.len() != previous.len() {
        tracing::info!(count = rows.len(), "active auctions");
    }
    rows
}
