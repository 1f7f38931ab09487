//! Synchronization layer configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Cache lifetimes are chosen to exceed
//! the matching default poll interval so that a poll tick never races a
//! staleness-triggered refetch.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::ChainId;

/// Maximum age, in milliseconds, before each resource kind is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// Single auction summaries.
    pub auction_summary_ms: i64,
    /// Active / settled / by-creator lists and the shared fetch-all metadata.
    pub auction_list_ms: i64,
    /// Bid history pages.
    pub bid_history_ms: i64,
    /// Per-auction and aggregate user commitments.
    pub commitment_ms: i64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            auction_summary_ms: 6_000,
            auction_list_ms: 12_000,
            bid_history_ms: 6_000,
            commitment_ms: 10_000,
        }
    }
}

/// Default polling periods used by the query handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    /// Auction summary polling period.
    pub auction_summary: Duration,
    /// Auction list polling period.
    pub auction_list: Duration,
    /// Bid history polling period.
    pub bid_history: Duration,
    /// Commitment polling period.
    pub commitment: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            auction_summary: Duration::from_millis(5_000),
            auction_list: Duration::from_millis(10_000),
            bid_history: Duration::from_millis(5_000),
            commitment: Duration::from_millis(8_000),
        }
    }
}

/// Top-level configuration.
///
/// Loaded once at startup via [`SyncConfig::from_env`]; tests build it
/// with [`SyncConfig::default`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the node service (e.g. `http://localhost:8080`).
    pub node_url: String,

    /// Chain hosting the auction authority application.
    pub aac_chain: ChainId,

    /// Application ID of the auction application.
    pub auction_app_id: String,

    /// Application ID of the optional indexer application.
    pub indexer_app_id: Option<String>,

    /// Wallet chain to start the session with, if any.
    pub user_chain: Option<ChainId>,

    /// Cache lifetimes.
    pub ttls: CacheTtls,

    /// Default polling periods.
    pub poll_intervals: PollIntervals,

    /// Page size used by the shared fetch-all primitive.
    pub all_auctions_limit: usize,

    /// Capacity of the store's event broadcast channel.
    pub event_bus_capacity: usize,

    /// Where the indexer bootstrap record is kept; `None` keeps it in memory.
    pub bootstrap_record_path: Option<PathBuf>,

    /// Timeout applied to every remote request.
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            node_url: "http://localhost:8080".to_string(),
            aac_chain: ChainId::new("aac"),
            auction_app_id: "auction".to_string(),
            indexer_app_id: None,
            user_chain: None,
            ttls: CacheTtls::default(),
            poll_intervals: PollIntervals::default(),
            all_auctions_limit: 200,
            event_bus_capacity: 1_024,
            bootstrap_record_path: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl SyncConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `AAC_CHAIN_ID` or `AUCTION_APP_ID` is missing,
    /// since nothing can be queried without them.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let node_url = std::env::var("NODE_URL").unwrap_or(defaults.node_url);
        let aac_chain = ChainId::new(std::env::var("AAC_CHAIN_ID")?);
        let auction_app_id = std::env::var("AUCTION_APP_ID")?;
        let indexer_app_id = std::env::var("INDEXER_APP_ID").ok();
        let user_chain = std::env::var("USER_CHAIN_ID").ok().map(ChainId::new);

        let ttls = CacheTtls {
            auction_summary_ms: parse_env("AUCTION_SUMMARY_TTL_MS", defaults.ttls.auction_summary_ms),
            auction_list_ms: parse_env("AUCTION_LIST_TTL_MS", defaults.ttls.auction_list_ms),
            bid_history_ms: parse_env("BID_HISTORY_TTL_MS", defaults.ttls.bid_history_ms),
            commitment_ms: parse_env("COMMITMENT_TTL_MS", defaults.ttls.commitment_ms),
        };

        let poll_intervals = PollIntervals {
            auction_summary: parse_env_millis("AUCTION_SUMMARY_POLL_MS", 5_000),
            auction_list: parse_env_millis("AUCTION_LIST_POLL_MS", 10_000),
            bid_history: parse_env_millis("BID_HISTORY_POLL_MS", 5_000),
            commitment: parse_env_millis("COMMITMENT_POLL_MS", 8_000),
        };

        let all_auctions_limit = parse_env("ALL_AUCTIONS_LIMIT", defaults.all_auctions_limit);
        let event_bus_capacity = parse_env("EVENT_BUS_CAPACITY", defaults.event_bus_capacity);
        let bootstrap_record_path = std::env::var("BOOTSTRAP_RECORD_PATH").ok().map(PathBuf::from);
        let request_timeout = Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 30));

        Ok(Self {
            node_url,
            aac_chain,
            auction_app_id,
            indexer_app_id,
            user_chain,
            ttls,
            poll_intervals,
            all_auctions_limit,
            event_bus_capacity,
            bootstrap_record_path,
            request_timeout,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(parse_env(key, default))
}
