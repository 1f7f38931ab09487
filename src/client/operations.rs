//! Documents for every remote operation this layer issues.

use super::dto::{
    AUCTION_FIELDS, BID_FIELDS, COMMITMENT_FIELDS, SUBSCRIPTION_INFO_FIELDS, millis_to_micros,
};
use super::request::{ArgValue, GraphQlRequest};
use crate::domain::{AuctionId, ChainId, NewAuction};

/// `auctionInfo(auctionId)`.
#[must_use]
pub fn auction_info(auction_id: AuctionId) -> GraphQlRequest {
    GraphQlRequest::query("auctionInfo")
        .arg("auctionId", auction_id.get())
        .select(AUCTION_FIELDS)
}

/// `allAuctions(offset, limit)`, newest first.
#[must_use]
pub fn all_auctions(offset: usize, limit: usize) -> GraphQlRequest {
    GraphQlRequest::query("allAuctions")
        .arg("offset", offset)
        .arg("limit", limit)
        .select(AUCTION_FIELDS)
}

/// `bidHistory(auctionId, offset, limit)`, oldest first.
#[must_use]
pub fn bid_history(auction_id: AuctionId, offset: usize, limit: usize) -> GraphQlRequest {
    GraphQlRequest::query("bidHistory")
        .arg("auctionId", auction_id.get())
        .arg("offset", offset)
        .arg("limit", limit)
        .select(BID_FIELDS)
}

/// `myCommitmentForAuction(auctionId)` on the user chain.
#[must_use]
pub fn my_commitment_for_auction(auction_id: AuctionId) -> GraphQlRequest {
    GraphQlRequest::query("myCommitmentForAuction")
        .arg("auctionId", auction_id.get())
        .select(COMMITMENT_FIELDS)
}

/// `myAuctionCommitment` on the user chain.
#[must_use]
pub fn my_auction_commitment() -> GraphQlRequest {
    GraphQlRequest::query("myAuctionCommitment")
        .select(&format!("auctionId commitment {{ {COMMITMENT_FIELDS} }}"))
}

/// Indexer `subscriptionInfo`.
#[must_use]
pub fn subscription_info() -> GraphQlRequest {
    GraphQlRequest::query("subscriptionInfo").select(SUBSCRIPTION_INFO_FIELDS)
}

/// `createAuction(params)`.
#[must_use]
pub fn create_auction(params: &NewAuction) -> GraphQlRequest {
    let fields = vec![
        ("itemName".to_string(), ArgValue::from(params.item_name.as_str())),
        ("totalSupply".to_string(), ArgValue::Int(params.total_supply)),
        ("startPrice".to_string(), ArgValue::from(params.start_price.as_str())),
        ("floorPrice".to_string(), ArgValue::from(params.floor_price.as_str())),
        (
            "priceDecayInterval".to_string(),
            ArgValue::Int(millis_to_micros(params.price_decay_interval_ms)),
        ),
        (
            "priceDecayAmount".to_string(),
            ArgValue::from(params.price_decay_amount.as_str()),
        ),
        (
            "startTime".to_string(),
            ArgValue::Int(millis_to_micros(params.start_time_ms)),
        ),
        (
            "endTime".to_string(),
            ArgValue::Int(millis_to_micros(params.end_time_ms)),
        ),
        ("creator".to_string(), ArgValue::from(params.creator.as_str())),
    ];
    GraphQlRequest::mutation("createAuction").arg("params", ArgValue::Object(fields))
}

/// `buy(auctionId, quantity)`.
#[must_use]
pub fn buy(auction_id: AuctionId, quantity: u64) -> GraphQlRequest {
    GraphQlRequest::mutation("buy")
        .arg("auctionId", auction_id.get())
        .arg("quantity", quantity.to_string())
}

/// `claimSettlement(auctionId)`.
#[must_use]
pub fn claim_settlement(auction_id: AuctionId) -> GraphQlRequest {
    GraphQlRequest::mutation("claimSettlement").arg("auctionId", auction_id.get())
}

/// `subscribeToAuction(aacChain)`.
#[must_use]
pub fn subscribe_to_auction(aac_chain: &ChainId) -> GraphQlRequest {
    GraphQlRequest::mutation("subscribeToAuction").arg("aacChain", aac_chain.as_str())
}

/// `unsubscribeFromAuction(aacChain)`.
#[must_use]
pub fn unsubscribe_from_auction(aac_chain: &ChainId) -> GraphQlRequest {
    GraphQlRequest::mutation("unsubscribeFromAuction").arg("aacChain", aac_chain.as_str())
}

/// `trigger`: flushes pending messages on the authority chain.
#[must_use]
pub fn trigger() -> GraphQlRequest {
    GraphQlRequest::mutation("trigger")
}

/// Indexer `initialize`.
#[must_use]
pub fn initialize_indexer() -> GraphQlRequest {
    GraphQlRequest::mutation("initialize")
}
