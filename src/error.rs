//! Synchronization layer error types.
//!
//! [`SyncError`] is the central error type for the crate. Every variant
//! carries a numeric code so callers (and logs) can classify failures
//! without matching on message text.
//!
//! The enum is `Clone`: a single in-flight remote call may be awaited by
//! several callers at once, and each of them receives the same rejection.

/// Error enum for the cache, client, and mutation layers.
///
/// # Error Code Ranges
///
/// | Range     | Category                       |
/// |-----------|--------------------------------|
/// | 1000–1999 | Precondition / validation      |
/// | 2000–2999 | Remote call / envelope         |
/// | 3000–3999 | Local (persistence / internal) |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// No wallet is connected, so there is no user chain to act on.
    #[error("wallet not connected")]
    WalletNotConnected,

    /// The wallet is still synchronizing its chain.
    #[error("wallet is synchronizing; try again shortly")]
    WalletSyncing,

    /// Caller-supplied input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The request never produced a response (network, timeout, HTTP status).
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote application answered with a non-empty `errors` array.
    #[error("remote error: {}", .0.join("; "))]
    Remote(Vec<String>),

    /// The remote application answered with `data: null`.
    #[error("remote returned no data for {0}")]
    NullPayload(String),

    /// A response did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Reading or writing the local bootstrap record failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::WalletNotConnected => 1001,
            Self::WalletSyncing => 1002,
            Self::InvalidInput(_) => 1003,
            Self::Transport(_) => 2001,
            Self::Remote(_) => 2002,
            Self::NullPayload(_) => 2003,
            Self::Parse(_) => 2004,
            Self::Persistence(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns `true` for failures raised before any network call was made.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::WalletNotConnected | Self::WalletSyncing | Self::InvalidInput(_)
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
