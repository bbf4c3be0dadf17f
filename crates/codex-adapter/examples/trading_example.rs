/*
[INPUT]:  CODEX_PUBLIC_KEY / CODEX_SECRET_KEY environment variables
[OUTPUT]: Order placement/cancellation responses
[POS]:    Examples - trading operations
[UPDATE]: When trading API changes
*/

use codex_adapter::*;
use serde::Serialize;

/// Order body; field order is the signed JSON order
#[derive(Debug, Serialize)]
struct NewOrder<'a> {
    market: &'a str,
    side: Side,
    volume: &'a str,
    price: &'a str,
}

/// Example: trading operations (signed headers on every request)
///
/// Each call carries X-Tonce, X-Signature and X-Public-Key, the signature
/// covering `JSON(body) + route + nonce`.
#[tokio::main]
async fn main() {
    println!("=== Codex Trading Example ===\n");

    let public_key = std::env::var("CODEX_PUBLIC_KEY").unwrap_or_default();
    let secret_key = std::env::var("CODEX_SECRET_KEY").unwrap_or_default();
    let credentials = match Credentials::new(public_key, &secret_key) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Set CODEX_PUBLIC_KEY and CODEX_SECRET_KEY: {}", e);
            return;
        }
    };

    let client = match CodexClient::new() {
        Ok(c) => c.with_credentials(credentials),
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    println!("✓ HTTP client created");

    let order = NewOrder {
        market: "ethbtc",
        side: Side::Buy,
        volume: "0.1",
        price: "0.05",
    };
    match client.place_orders(&order).await {
        Ok(resp) => println!("✓ Order placed: {}", resp),
        Err(e) => eprintln!("Place order failed: {}", e),
    }

    match client.active_orders(&OrdersQuery::default()).await {
        Ok(orders) => println!("✓ Active orders: {}", orders),
        Err(e) => eprintln!("Query orders failed: {}", e),
    }

    match client.cancel_orders(Some("ethbtc"), Some(Side::Buy)).await {
        Ok(resp) => println!("✓ Cancelled: {}", resp),
        Err(e) => eprintln!("Cancel failed: {}", e),
    }

    println!("\n✓ Trading example complete");
}
