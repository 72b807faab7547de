use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::source::{FetchError, PriceSource};

/// HTTP client for the MEXC spot ticker endpoint.
#[derive(Clone)]
pub struct MexcPriceClient {
    client: Client,
    base_api: String,
}

impl MexcPriceClient {
    pub fn new(base_api: String) -> anyhow::Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self { client, base_api })
    }

    /// Create a client from environment variables.
    /// Expects MEXC_API_BASE_URL to be set.
    pub fn from_env() -> anyhow::Result<Self> {
        let base_api = std::env::var("MEXC_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.mexc.com".to_string());
        Self::new(base_api)
    }
}

//
// Match MEXC API JSON
// GET /api/v3/ticker/price?symbol=BTCUSDT -> {"symbol":"BTCUSDT","price":"65000.00"}
//
#[derive(Debug, Deserialize)]
struct TickerPrice {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

#[async_trait]
impl PriceSource for MexcPriceClient {
    async fn fetch_price(&self, symbol: &str) -> Result<f64, FetchError> {
        let url = format!(
            "{}/api/v3/ticker/price",
            self.base_api.trim_end_matches('/')
        );

        let res = self
            .client
            .get(url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let ticker: TickerPrice = res
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        parse_price(&ticker.price)
    }
}

fn parse_price(raw: &str) -> Result<f64, FetchError> {
    let price: f64 = raw
        .parse()
        .map_err(|_| FetchError::InvalidResponse(format!("bad price `{raw}`")))?;

    if !price.is_finite() || price < 0.0 {
        return Err(FetchError::InvalidResponse(format!(
            "price out of range: {price}"
        )));
    }

    Ok(price)
}
