//! Normalized auction records.
//!
//! An [`Auction`] is what the store keeps and what query handles expose.
//! Every time value is in milliseconds since the Unix epoch; conversion
//! from the remote microsecond representation happens once, in
//! [`crate::client::dto`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::amount::{format_amount, parse_amount};
use super::{AuctionId, Owner};
use crate::error::SyncError;

/// Auction lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuctionStatus {
    /// Created but the start time has not been reached.
    Scheduled,
    /// Accepting bids.
    Active,
    /// Closed, bids no longer accepted, not yet settled.
    Ended,
    /// Clearing price fixed; allocations can be claimed.
    Settled,
    /// Cancelled by its creator before any bid.
    Cancelled,
}

impl AuctionStatus {
    /// Returns `true` once the status can no longer change.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Settled | Self::Cancelled)
    }
}

/// A single auction as cached by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    /// Auction identifier.
    pub id: AuctionId,
    /// Human-readable item name.
    pub item_name: String,
    /// Units offered.
    pub total_supply: u64,
    /// Price per unit at the start.
    pub start_price: String,
    /// Reserve price; the price never decays below it.
    pub floor_price: String,
    /// Amount subtracted each decay interval.
    pub price_decay_amount: String,
    /// Milliseconds between price drops.
    pub price_decay_interval_ms: i64,
    /// Start time, ms since epoch.
    pub start_time_ms: i64,
    /// End time, ms since epoch.
    pub end_time_ms: i64,
    /// Account that created the auction.
    pub creator: Owner,
    /// Price per unit as last reported by the authority.
    pub current_price: String,
    /// Units sold so far.
    pub sold: u64,
    /// Uniform clearing price; set once settled and never changed after.
    pub clearing_price: Option<String>,
    /// Lifecycle state.
    pub status: AuctionStatus,
    /// Number of bids placed.
    pub total_bids: u64,
    /// Number of distinct bidders.
    pub total_bidders: u64,
}

impl Auction {
    /// Start time as a UTC datetime.
    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.start_time_ms)
    }

    /// End time as a UTC datetime.
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.end_time_ms)
    }

    /// Units still available.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.total_supply.saturating_sub(self.sold)
    }

    /// Projects the decayed price at `now_ms` from the auction parameters.
    ///
    /// Lets a display tick between polls. Returns the start price before
    /// the start time, and never goes below the floor price. Returns
    /// `None` when one of the amounts cannot be parsed.
    #[must_use]
    pub fn projected_price(&self, now_ms: i64) -> Option<String> {
        let start = parse_amount(&self.start_price).ok()?;
        let floor = parse_amount(&self.floor_price).ok()?;
        if now_ms < self.start_time_ms || self.price_decay_interval_ms <= 0 {
            return Some(format_amount(start));
        }
        let decay = parse_amount(&self.price_decay_amount).ok()?;
        let intervals = (now_ms - self.start_time_ms) / self.price_decay_interval_ms;
        let total_decay = decay.checked_mul(Decimal::from(intervals))?;
        let price = start.checked_sub(total_decay).unwrap_or(Decimal::ZERO);
        Some(format_amount(price.max(floor)))
    }

    /// Carries the clearing price of an already settled `previous` record
    /// over to `self`, so a later response cannot rewrite it.
    ///
    /// Returns `true` if the incoming record disagreed and was corrected.
    pub fn keep_settled_clearing_price(&mut self, previous: &Self) -> bool {
        if previous.status != AuctionStatus::Settled {
            return false;
        }
        let Some(settled_price) = previous.clearing_price.as_ref() else {
            return false;
        };
        if self.clearing_price.as_ref() == Some(settled_price) {
            return false;
        }
        self.clearing_price = Some(settled_price.clone());
        true
    }
}

/// Parameters for a new auction, as entered by its creator.
///
/// Times are in milliseconds; the client converts them to the remote
/// microsecond representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuction {
    /// Human-readable item name.
    pub item_name: String,
    /// Units offered.
    pub total_supply: u64,
    /// Price per unit at the start.
    pub start_price: String,
    /// Reserve price.
    pub floor_price: String,
    /// Amount subtracted each decay interval.
    pub price_decay_amount: String,
    /// Milliseconds between price drops.
    pub price_decay_interval_ms: i64,
    /// Start time, ms since epoch.
    pub start_time_ms: i64,
    /// End time, ms since epoch.
    pub end_time_ms: i64,
    /// Creator account.
    pub creator: Owner,
}

impl NewAuction {
    /// Checks the parameters before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidInput`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.item_name.trim().is_empty() {
            return Err(SyncError::InvalidInput("item name is empty".to_string()));
        }
        if self.total_supply == 0 {
            return Err(SyncError::InvalidInput("total supply must be positive".to_string()));
        }
        let start = parse_amount(&self.start_price)?;
        let floor = parse_amount(&self.floor_price)?;
        let decay = parse_amount(&self.price_decay_amount)?;
        if floor > start {
            return Err(SyncError::InvalidInput(format!(
                "floor price {} exceeds start price {}",
                self.floor_price, self.start_price
            )));
        }
        if decay.is_sign_negative() {
            return Err(SyncError::InvalidInput("price decay amount is negative".to_string()));
        }
        if self.price_decay_interval_ms <= 0 {
            return Err(SyncError::InvalidInput("price decay interval must be positive".to_string()));
        }
        if self.end_time_ms <= self.start_time_ms {
            return Err(SyncError::InvalidInput("end time must be after start time".to_string()));
        }
        Ok(())
    }
}
