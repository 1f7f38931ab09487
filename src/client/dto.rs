//! Wire shapes of the auction application and their normalization.
//!
//! Each DTO mirrors exactly one response shape. Conversion into the
//! domain types is where microseconds become milliseconds and where
//! invariants (`floor_price <= start_price`) are checked; a violation
//! fails closed with [`SyncError::Parse`].

use serde::{Deserialize, Deserializer};

use crate::domain::amount::parse_amount;
use crate::domain::{
    Auction, AuctionCommitment, AuctionId, AuctionStatus, BidRecord, ChainId, Owner,
    SettlementResult, SubscriptionInfo, UserCommitment,
};
use crate::error::SyncError;

/// Selection set for auction payloads.
pub const AUCTION_FIELDS: &str = "auctionId params { itemName totalSupply startPrice floorPrice \
     priceDecayInterval priceDecayAmount startTime endTime creator } currentPrice sold \
     clearingPrice status totalBids totalBidders";

/// Selection set for bid payloads.
pub const BID_FIELDS: &str = "bidId auctionId userChain quantity amountPaid timestamp claimed";

/// Selection set for commitment payloads.
pub const COMMITMENT_FIELDS: &str =
    "totalQuantity settlement { allocatedQuantity clearingPrice totalCost refund }";

/// Selection set for indexer subscription info.
pub const SUBSCRIPTION_INFO_FIELDS: &str = "aacChain auctionApp initialized";

/// Converts remote microseconds into milliseconds.
#[must_use]
pub fn micros_to_millis(micros: u64) -> i64 {
    i64::try_from(micros / 1_000).unwrap_or(i64::MAX)
}

/// Converts milliseconds into remote microseconds (negative clamps to 0).
#[must_use]
pub fn millis_to_micros(millis: i64) -> u64 {
    u64::try_from(millis).unwrap_or(0).saturating_mul(1_000)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

/// Quantities arrive either as integers or as amount strings (`"5."`).
fn quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => {
            let trimmed = s.trim();
            let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
            trimmed
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid quantity {s:?}")))
        }
    }
}

/// Amounts are strings on the wire; bare integers are tolerated.
fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::Text(s) => s,
    })
}

fn optional_amount<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(
        Option::<NumberOrString>::deserialize(deserializer)?.map(|v| match v {
            NumberOrString::Number(n) => n.to_string(),
            NumberOrString::Text(s) => s,
        }),
    )
}

/// Status as reported by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum WireStatus {
    /// Not started.
    Scheduled,
    /// Accepting bids.
    Active,
    /// Closed, not settled.
    Ended,
    /// Settled.
    Settled,
    /// Settled, with its bid records archived by the indexer.
    Pruned,
    /// Cancelled.
    Cancelled,
}

impl From<WireStatus> for AuctionStatus {
    fn from(status: WireStatus) -> Self {
        match status {
            WireStatus::Scheduled => Self::Scheduled,
            WireStatus::Active => Self::Active,
            WireStatus::Ended => Self::Ended,
            WireStatus::Settled | WireStatus::Pruned => Self::Settled,
            WireStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// `params { ... }` of an auction payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionParamsDto {
    /// Item name.
    pub item_name: String,
    /// Units offered.
    #[serde(deserialize_with = "quantity")]
    pub total_supply: u64,
    /// Start price.
    #[serde(deserialize_with = "amount")]
    pub start_price: String,
    /// Floor price.
    #[serde(deserialize_with = "amount")]
    pub floor_price: String,
    /// Decay interval in microseconds.
    pub price_decay_interval: u64,
    /// Decay amount.
    #[serde(deserialize_with = "amount")]
    pub price_decay_amount: String,
    /// Start time in microseconds.
    pub start_time: u64,
    /// End time in microseconds.
    pub end_time: u64,
    /// Creator account.
    pub creator: String,
}

/// Auction payload (`auctionInfo`, `allAuctions`, `auctionsByCreator`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionDto {
    /// Auction number.
    pub auction_id: u64,
    /// Creator-supplied parameters.
    pub params: AuctionParamsDto,
    /// Current price.
    #[serde(deserialize_with = "amount")]
    pub current_price: String,
    /// Units sold.
    #[serde(deserialize_with = "quantity")]
    pub sold: u64,
    /// Clearing price once settled.
    #[serde(default, deserialize_with = "optional_amount")]
    pub clearing_price: Option<String>,
    /// Lifecycle state.
    pub status: WireStatus,
    /// Number of bids.
    pub total_bids: u64,
    /// Number of distinct bidders.
    pub total_bidders: u64,
}

impl TryFrom<AuctionDto> for Auction {
    type Error = SyncError;

    fn try_from(dto: AuctionDto) -> Result<Self, Self::Error> {
        let start = parse_amount(&dto.params.start_price)
            .map_err(|e| SyncError::Parse(e.to_string()))?;
        let floor = parse_amount(&dto.params.floor_price)
            .map_err(|e| SyncError::Parse(e.to_string()))?;
        if floor > start {
            return Err(SyncError::Parse(format!(
                "auction {}: floor price {} above start price {}",
                dto.auction_id, dto.params.floor_price, dto.params.start_price
            )));
        }

        let status = AuctionStatus::from(dto.status);
        let clearing_price = if status == AuctionStatus::Settled {
            dto.clearing_price
        } else {
            None
        };

        Ok(Self {
            id: AuctionId::new(dto.auction_id),
            item_name: dto.params.item_name,
            total_supply: dto.params.total_supply,
            start_price: dto.params.start_price,
            floor_price: dto.params.floor_price,
            price_decay_amount: dto.params.price_decay_amount,
            price_decay_interval_ms: micros_to_millis(dto.params.price_decay_interval),
            start_time_ms: micros_to_millis(dto.params.start_time),
            end_time_ms: micros_to_millis(dto.params.end_time),
            creator: Owner::new(dto.params.creator),
            current_price: dto.current_price,
            sold: dto.sold,
            clearing_price,
            status,
            total_bids: dto.total_bids,
            total_bidders: dto.total_bidders,
        })
    }
}

/// Bid payload (`bidHistory`, `userBids`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidDto {
    /// Bid number.
    pub bid_id: u64,
    /// Auction number.
    pub auction_id: u64,
    /// Bidder chain (older deployments call it `userAccount`).
    #[serde(alias = "userAccount")]
    pub user_chain: String,
    /// Units requested.
    #[serde(deserialize_with = "quantity")]
    pub quantity: u64,
    /// Escrowed amount.
    #[serde(deserialize_with = "amount")]
    pub amount_paid: String,
    /// Placement time in microseconds.
    pub timestamp: u64,
    /// Whether the settlement was claimed.
    pub claimed: bool,
}

impl From<BidDto> for BidRecord {
    fn from(dto: BidDto) -> Self {
        Self {
            bid_id: dto.bid_id,
            auction_id: AuctionId::new(dto.auction_id),
            bidder: ChainId::new(dto.user_chain),
            quantity: dto.quantity,
            amount_paid: dto.amount_paid,
            timestamp_ms: micros_to_millis(dto.timestamp),
            claimed: dto.claimed,
        }
    }
}

/// `settlement { ... }` of a commitment payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementDto {
    /// Units received.
    #[serde(deserialize_with = "quantity")]
    pub allocated_quantity: u64,
    /// Clearing price.
    #[serde(deserialize_with = "amount")]
    pub clearing_price: String,
    /// Total cost.
    #[serde(deserialize_with = "amount")]
    pub total_cost: String,
    /// Refund.
    #[serde(deserialize_with = "amount")]
    pub refund: String,
}

/// Commitment payload (`myCommitmentForAuction`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentDto {
    /// Total units bid for.
    #[serde(deserialize_with = "quantity")]
    pub total_quantity: u64,
    /// Settlement, once available.
    #[serde(default)]
    pub settlement: Option<SettlementDto>,
}

impl From<CommitmentDto> for UserCommitment {
    fn from(dto: CommitmentDto) -> Self {
        Self {
            total_quantity: dto.total_quantity,
            settlement: dto.settlement.map(|s| SettlementResult {
                allocated_quantity: s.allocated_quantity,
                clearing_price: s.clearing_price,
                total_cost: s.total_cost,
                refund: s.refund,
            }),
        }
    }
}

/// Entry of `myAuctionCommitment`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionCommitmentDto {
    /// Auction number.
    pub auction_id: u64,
    /// The commitment.
    pub commitment: CommitmentDto,
}

impl From<AuctionCommitmentDto> for AuctionCommitment {
    fn from(dto: AuctionCommitmentDto) -> Self {
        Self {
            auction_id: AuctionId::new(dto.auction_id),
            commitment: dto.commitment.into(),
        }
    }
}

/// Indexer `subscriptionInfo` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfoDto {
    /// Auction authority chain.
    pub aac_chain: String,
    /// Auction application.
    pub auction_app: String,
    /// Initialization flag.
    pub initialized: bool,
}

impl From<SubscriptionInfoDto> for SubscriptionInfo {
    fn from(dto: SubscriptionInfoDto) -> Self {
        Self {
            aac_chain: ChainId::new(dto.aac_chain),
            auction_app: dto.auction_app,
            initialized: dto.initialized,
        }
    }
}
