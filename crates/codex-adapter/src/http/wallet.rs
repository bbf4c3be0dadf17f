/*
[INPUT]:  Currency codes, withdrawal details and configured credentials
[OUTPUT]: Deposit addresses, withdrawal results and history as raw JSON
[POS]:    HTTP layer - coin service wallet endpoints (require signed body)
[UPDATE]: When adding wallet endpoints or changing coin service routes
*/

use reqwest::Method;
use serde_json::{Value, json};

use crate::http::client::Service;
use crate::http::{CodexClient, CodexError, Result};
use crate::types::WithdrawRequest;

impl CodexClient {
    /// Get the deposit address for a currency
    ///
    /// GET /coins2/api/deposit/{currency}/address
    pub async fn deposit_address(&self, currency: &str) -> Result<Value> {
        let currency = require("currency", currency)?;
        let route = format!("/api/deposit/{}/address", currency.to_lowercase());
        let builder = self.signed_body_request(Method::GET, Service::Coins, &route, &json!({}))?;
        self.send_json(builder).await
    }

    /// Request a withdrawal
    ///
    /// POST /coins2/api/withdraw/{currency}
    pub async fn withdraw(&self, currency: &str, req: &WithdrawRequest) -> Result<Value> {
        let currency = require("currency_code", currency)?;
        require("address", &req.address)?;
        let route = format!("/api/withdraw/{currency}");
        let builder = self.signed_body_request(Method::POST, Service::Coins, &route, req)?;
        self.send_json(builder).await
    }

    /// Withdrawal history for a currency
    ///
    /// GET /coins2/api/withdraw/{currency}
    pub async fn withdraw_history(&self, currency: &str) -> Result<Value> {
        let currency = require("currency_code", currency)?;
        let route = format!("/api/withdraw/{currency}");
        let builder = self.signed_body_request(Method::GET, Service::Coins, &route, &json!({}))?;
        self.send_json(builder).await
    }
}

fn require<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CodexError::InvalidArgument(format!("{name} is required")));
    }
    Ok(value)
}
