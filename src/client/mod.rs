//! Remote application client.
//!
//! The store talks to the chain only through [`ApplicationClient`]: a
//! read-only `query`, a state-mutating `mutate`, and a separate system
//! pair used to bootstrap the indexer. Requests are built with
//! [`GraphQlRequest`]; responses are raw JSON strings decoded by
//! [`envelope`] into the shapes in [`dto`].

pub mod dto;
pub mod envelope;
pub mod http;
pub mod operations;
pub mod request;

use std::fmt;

use async_trait::async_trait;

use crate::domain::ChainId;
use crate::error::SyncError;

pub use envelope::{decode_field, decode_optional_field};
pub use http::HttpApplicationClient;
pub use request::{ArgValue, GraphQlRequest, OperationKind};

/// Which instance of the auction application a call is routed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AppTarget {
    /// The auction authority chain (auctions, prices, bid history).
    Authority,
    /// A user chain (bids, claims, commitments).
    User(ChainId),
}

/// Executes queries and mutations against the remote application.
///
/// Implementations return the raw response body; they only fail for
/// transport-level problems. Envelope errors are detected by the caller.
#[async_trait]
pub trait ApplicationClient: Send + Sync + fmt::Debug {
    /// Runs a read-only query.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if no response was obtained.
    async fn query(&self, target: &AppTarget, request: &GraphQlRequest) -> Result<String, SyncError>;

    /// Runs a state-mutating operation.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if no response was obtained.
    async fn mutate(&self, target: &AppTarget, request: &GraphQlRequest)
    -> Result<String, SyncError>;

    /// Runs a query against the indexer application.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if no response was obtained.
    async fn system_query(&self, request: &GraphQlRequest) -> Result<String, SyncError>;

    /// Runs a mutation against the indexer application.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if no response was obtained.
    async fn system_mutate(&self, request: &GraphQlRequest) -> Result<String, SyncError>;
}
