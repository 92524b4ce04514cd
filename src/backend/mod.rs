//! Backend query clients
//!
//! This module provides:
//! - The read-only interfaces the collector queries (`TokenApi`, `DwhClient`)
//! - Request / reply types for the DWH count queries
//! - HTTP implementations of both interfaces
//!
//! The collector core only talks to the traits; the concrete clients are
//! wired in `main`.

pub mod dwh;
pub mod token;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::schema::Address;

/// Server-side result size hint for count queries.
///
/// Only the total count is used; the limit keeps the listing the server
/// builds alongside it small.
pub const COUNT_QUERY_LIMIT: u64 = 500;

/// Token balance lookup.
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - One instance is shared by all sub-queries
///
#[async_trait]
pub trait TokenApi: Send + Sync {
    /// Returns the raw (integer, 18-decimal scaled) token balance.
    async fn balance_of(&self, addr: Address) -> anyhow::Result<u128>;
}

/// Deal and order listings from the data warehouse.
#[async_trait]
pub trait DwhClient: Send + Sync {
    async fn get_deals(&self, req: &DealsRequest) -> anyhow::Result<CountReply>;

    async fn get_orders(&self, req: &OrdersRequest) -> anyhow::Result<CountReply>;
}

// Only the filter values the collector sends are modelled.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStatus {
    DealAccepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    OrderActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Any,
}

/// Deal listing filter.
///
/// `any_user_id` matches deals where the address is either the
/// supplier or the consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealsRequest {
    pub status: DealStatus,
    pub limit: u64,
    pub with_count: bool,
    #[serde(rename = "anyUserID")]
    pub any_user_id: Address,
}

impl DealsRequest {
    /// Accepted deals the address takes part in, count only.
    pub fn accepted_for(addr: Address) -> Self {
        Self {
            status: DealStatus::DealAccepted,
            limit: COUNT_QUERY_LIMIT,
            with_count: true,
            any_user_id: addr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersRequest {
    pub status: OrderStatus,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub limit: u64,
    pub with_count: bool,
    #[serde(rename = "authorID")]
    pub author_id: Address,
}

impl OrdersRequest {
    /// Active orders of any type authored by the address, count only.
    pub fn active_for(addr: Address) -> Self {
        Self {
            status: OrderStatus::OrderActive,
            order_type: OrderType::Any,
            limit: COUNT_QUERY_LIMIT,
            with_count: true,
            author_id: addr,
        }
    }
}

/// Listing reply reduced to its total count.
///
/// JSON gateways encode 64-bit integers as strings, so both `"count": 7`
/// and `"count": "7"` are accepted. A missing count means zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CountReply {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub count: u64,
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(u64),
        Str(String),
    }

    match NumOrString::deserialize(deserializer)? {
        NumOrString::Num(n) => Ok(n),
        NumOrString::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Shared HTTP client for the backend implementations.
///
/// Per-request deadlines are applied by the collector, so only the
/// connect phase is bounded here.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    Ok(client)
}
