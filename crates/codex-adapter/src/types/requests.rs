/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed request bodies and query parameter sets
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{Side, SortOrder};

/// Body of POST /orders/cancel. Field order is part of the signed payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelOrdersRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
}

/// Body of POST /api/withdraw/{currency}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub address: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// Sent as explicit `null` when absent
    pub expected_tag: Option<String>,
}

/// Filters for GET /orders/active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdersQuery {
    pub market: Option<String>,
    pub status: Option<String>,
    pub side: Option<Side>,
    pub order_type: Option<String>,
    pub limit: Option<u32>,
    pub from_time: Option<i64>,
    pub to_time: Option<i64>,
    pub from_uuid: Option<String>,
    pub order: Option<SortOrder>,
}

impl Default for OrdersQuery {
    fn default() -> Self {
        Self {
            market: None,
            status: None,
            side: None,
            order_type: None,
            limit: Some(500),
            from_time: None,
            to_time: None,
            from_uuid: None,
            order: None,
        }
    }
}

impl OrdersQuery {
    /// Query pairs in the order the server signs them
    pub fn pairs(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("market", self.market.clone()),
            ("status", self.status.clone()),
            ("side", self.side.map(|side| side.to_string())),
            ("type", self.order_type.clone()),
            ("limit", self.limit.map(|limit| limit.to_string())),
            ("from_time", self.from_time.map(|t| t.to_string())),
            ("to_time", self.to_time.map(|t| t.to_string())),
            ("from_uuid", self.from_uuid.clone()),
            ("order", self.order.map(|order| order.as_str().to_string())),
        ]
    }
}

/// Filters for GET /trades_history/my
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradesQuery {
    pub limit: Option<u32>,
    pub from_time: Option<i64>,
    pub to_time: Option<i64>,
    pub page_token: Option<String>,
    pub market: Option<String>,
    pub side: Option<Side>,
}

impl TradesQuery {
    /// Query pairs in the order the server signs them
    pub fn pairs(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("limit", self.limit.map(|limit| limit.to_string())),
            ("from_time", self.from_time.map(|t| t.to_string())),
            ("to_time", self.to_time.map(|t| t.to_string())),
            ("page_token", self.page_token.clone()),
            ("market", self.market.clone()),
            ("side", self.side.map(|side| side.to_string())),
        ]
    }
}
