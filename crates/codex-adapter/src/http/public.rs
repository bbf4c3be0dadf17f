/*
[INPUT]:  No credentials
[OUTPUT]: Server time, tickers and exchange info as raw JSON
[POS]:    HTTP layer - public market data endpoints (no auth required)
[UPDATE]: When adding new public endpoints or changing response format
*/

use reqwest::Method;
use serde_json::Value;

use crate::http::{CodexClient, Result};

impl CodexClient {
    /// Query server time
    ///
    /// GET /users/timestamp
    pub async fn server_time(&self) -> Result<Value> {
        let builder = self.public_request(Method::GET, "/users/timestamp")?;
        self.send_json(builder).await
    }

    /// Query all tickers
    ///
    /// GET /tickers
    pub async fn ticker(&self) -> Result<Value> {
        let builder = self.public_request(Method::GET, "/tickers")?;
        self.send_json(builder).await
    }

    /// Query exchange info
    ///
    /// GET /info
    pub async fn info(&self) -> Result<Value> {
        let builder = self.public_request(Method::GET, "/info")?;
        self.send_json(builder).await
    }
}
