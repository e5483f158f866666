use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite;

use super::sampler::{extract_from_text, Credentials, SampleError, Sampler};

/// Samples the first price pushed by a websocket feed.
#[derive(Debug, Clone)]
pub struct WsSampler {
    url: String,
    subscribe: Option<String>,
    pointer: Option<String>,
    currency_symbol: String,
    timeout: Duration,
}

impl WsSampler {
    pub fn new(
        url: impl Into<String>,
        subscribe: Option<&str>,
        pointer: Option<String>,
        currency_symbol: impl Into<String>,
        timeout: Duration,
        credentials: &Credentials,
    ) -> Self {
        Self {
            url: url.into(),
            subscribe: subscribe.map(|frame| credentials.fill(frame)),
            pointer,
            currency_symbol: currency_symbol.into(),
            timeout,
        }
    }

    async fn read_price(&self) -> Result<String, SampleError> {
        info!("Connecting to price feed: {}", self.url);
        let (mut ws_stream, _) = connect_async(self.url.as_str()).await?;
        debug!("Connected to price feed");

        if let Some(frame) = &self.subscribe {
            ws_stream
                .send(tungstenite::protocol::Message::Text(frame.clone()))
                .await?;
        }

        while let Some(message) = ws_stream.next().await {
            match message? {
                tungstenite::protocol::Message::Text(text) => {
                    match extract_from_text(&text, self.pointer.as_deref(), &self.currency_symbol) {
                        Ok(price) => {
                            if let Err(e) = ws_stream.close(None).await {
                                debug!("Price feed close failed: {}", e);
                            }
                            return Ok(price);
                        }
                        Err(e) => warn!("Skipping frame without a price: {}", e),
                    }
                }
                tungstenite::protocol::Message::Close(_) => {
                    info!("Price feed closed the connection");
                    break;
                }
                _ => {} // Ignore other message types
            }
        }

        Err(SampleError::Closed)
    }
}

#[async_trait]
impl Sampler for WsSampler {
    async fn current_price(&self) -> Result<String, SampleError> {
        tokio::time::timeout(self.timeout, self.read_price())
            .await
            .map_err(|_| SampleError::Timeout(self.timeout))?
    }
}
