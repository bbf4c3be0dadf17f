/*
[INPUT]:  Order payloads and configured credentials
[OUTPUT]: Order placement/cancellation results as raw JSON
[POS]:    HTTP layer - trading endpoints (require signed body)
[UPDATE]: When adding new trading endpoints or changing order flow
*/

use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};

use crate::http::client::Service;
use crate::http::{CodexClient, CodexError, Result};
use crate::types::{CancelOrdersRequest, Side};

impl CodexClient {
    /// Place one or more orders. `orders` is serialized as-is and signed.
    ///
    /// POST /orders
    pub async fn place_orders<T: Serialize + ?Sized>(&self, orders: &T) -> Result<Value> {
        let builder = self.signed_body_request(Method::POST, Service::Exchange, "/orders", orders)?;
        self.send_json(builder).await
    }

    /// Cancel a single order by id
    ///
    /// DELETE /orders/{id}, signed over `{}`
    pub async fn cancel_order(&self, id: &str) -> Result<Value> {
        if id.trim().is_empty() {
            return Err(CodexError::InvalidArgument("order id is required".into()));
        }
        let route = format!("/orders/{id}");
        let builder = self.signed_body_request(Method::DELETE, Service::Exchange, &route, &json!({}))?;
        self.send_json(builder).await
    }

    /// Cancel all orders, optionally narrowed by market and side
    ///
    /// POST /orders/cancel
    pub async fn cancel_orders(&self, market: Option<&str>, side: Option<Side>) -> Result<Value> {
        let body = CancelOrdersRequest {
            market: market.map(str::to_string),
            side,
        };
        let builder =
            self.signed_body_request(Method::POST, Service::Exchange, "/orders/cancel", &body)?;
        self.send_json(builder).await
    }
}
