/*
[INPUT]:  Query filters and configured credentials
[OUTPUT]: Balances, orders, trades, rates as raw JSON
[POS]:    HTTP layer - account endpoints (require signed headers)
[UPDATE]: When adding new account endpoints or changing query parameters
*/

use reqwest::Method;
use serde_json::{Value, json};

use crate::http::client::Service;
use crate::http::{CodexClient, Result};
use crate::types::{OrdersQuery, TradesQuery};

impl CodexClient {
    /// Query account balances
    ///
    /// GET /balances, signed over `{}`
    pub async fn balances(&self) -> Result<Value> {
        let builder =
            self.signed_body_request(Method::GET, Service::Exchange, "/balances", &json!({}))?;
        self.send_json(builder).await
    }

    /// Query active orders
    ///
    /// GET /orders/active?market=..&status=..&side=..&type=..&limit=..
    pub async fn active_orders(&self, query: &OrdersQuery) -> Result<Value> {
        let builder = self.signed_query_request(Method::GET, "/orders/active", query.pairs())?;
        self.send_json(builder).await
    }

    /// Query own trade history
    ///
    /// GET /trades_history/my?limit=..&from_time=..&to_time=..&page_token=..
    pub async fn my_trades(&self, query: &TradesQuery) -> Result<Value> {
        let builder =
            self.signed_query_request(Method::GET, "/trades_history/my", query.pairs())?;
        self.send_json(builder).await
    }

    /// Query conversion rates
    ///
    /// GET /convert-rates, signed over `{}`
    pub async fn rates(&self) -> Result<Value> {
        let builder =
            self.signed_body_request(Method::GET, Service::Exchange, "/convert-rates", &json!({}))?;
        self.send_json(builder).await
    }

    /// Query markets from the coin service
    ///
    /// GET /coins2/market, signed over route `/market`
    pub async fn markets(&self) -> Result<Value> {
        let builder = self.signed_body_request(Method::GET, Service::Coins, "/market", &json!({}))?;
        self.send_json(builder).await
    }

    /// Query currencies from the coin service
    ///
    /// GET /coins2/currency, signed over route `/currency`
    pub async fn currencies(&self) -> Result<Value> {
        let builder =
            self.signed_body_request(Method::GET, Service::Coins, "/currency", &json!({}))?;
        self.send_json(builder).await
    }
}
