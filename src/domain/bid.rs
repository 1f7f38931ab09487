//! Bid and commitment records.

use serde::{Deserialize, Serialize};

use super::{AuctionId, ChainId};

/// A single bid as recorded by the auction authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidRecord {
    /// Bid identifier (chronological).
    pub bid_id: u64,
    /// Auction the bid belongs to.
    pub auction_id: AuctionId,
    /// Chain of the bidder.
    pub bidder: ChainId,
    /// Units requested.
    pub quantity: u64,
    /// Amount escrowed for the bid.
    pub amount_paid: String,
    /// When the bid was placed, ms since epoch.
    pub timestamp_ms: i64,
    /// Whether the settlement for this bid has been claimed.
    pub claimed: bool,
}

/// Outcome of a settled auction for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    /// Units received.
    pub allocated_quantity: u64,
    /// Final uniform price per unit.
    pub clearing_price: String,
    /// `allocated_quantity × clearing_price`.
    pub total_cost: String,
    /// Overpayment returned to the user.
    pub refund: String,
}

/// A user's aggregate position in one auction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCommitment {
    /// Total units bid for.
    pub total_quantity: u64,
    /// Present once the auction has settled.
    pub settlement: Option<SettlementResult>,
}

impl UserCommitment {
    /// Returns `true` when a settlement exists with something to receive.
    #[must_use]
    pub fn is_claimable(&self) -> bool {
        self.settlement
            .as_ref()
            .is_some_and(|s| s.allocated_quantity > 0 || !is_zero_amount(&s.refund))
    }
}

/// A commitment tagged with its auction, as returned by the aggregate view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionCommitment {
    /// Auction the commitment refers to.
    pub auction_id: AuctionId,
    /// The commitment itself.
    pub commitment: UserCommitment,
}

fn is_zero_amount(raw: &str) -> bool {
    raw.trim().trim_end_matches('.').chars().all(|c| c == '0' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settlement(allocated: u64, refund: &str) -> SettlementResult {
        SettlementResult {
            allocated_quantity: allocated,
            clearing_price: "10".to_string(),
            total_cost: (allocated * 10).to_string(),
            refund: refund.to_string(),
        }
    }

    #[test]
    fn unsettled_commitment_is_not_claimable() {
        let c = UserCommitment {
            total_quantity: 3,
            settlement: None,
        };
        assert!(!c.is_claimable());
    }

    #[test]
    fn allocation_makes_commitment_claimable() {
        let c = UserCommitment {
            total_quantity: 3,
            settlement: Some(settlement(3, "0.")),
        };
        assert!(c.is_claimable());
    }

    #[test]
    fn refund_alone_is_claimable() {
        let c = UserCommitment {
            total_quantity: 3,
            settlement: Some(settlement(0, "12.5")),
        };
        assert!(c.is_claimable());
    }

    #[test]
    fn nothing_to_receive_is_not_claimable() {
        let c = UserCommitment {
            total_quantity: 3,
            settlement: Some(settlement(0, "0.000")),
        };
        assert!(!c.is_claimable());
    }
}
