use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors a quote source can produce for a single fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetch did not complete within the configured bound.
    #[error("price fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Network/connectivity failure talking to the quote source.
    #[error("transport error: {0}")]
    Transport(String),

    /// The quote source answered, but the payload was not a usable price.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Port to the external quote provider.
///
/// Implementations fetch the current price for one symbol. Timeout
/// enforcement lives in the polling engine, not here.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self, symbol: &str) -> Result<f64, FetchError>;
}
