use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;

use super::sampler::{extract_price, Credentials, SampleError, Sampler};

/// Samples a price from a JSON endpoint, authenticating with basic auth
/// when credentials are configured.
pub struct HttpSampler {
    client: Client,
    url: String,
    pointer: String,
    currency_symbol: String,
    timeout: Duration,
    credentials: Credentials,
}

impl HttpSampler {
    pub fn new(
        url: impl Into<String>,
        pointer: impl Into<String>,
        currency_symbol: impl Into<String>,
        timeout: Duration,
        credentials: Credentials,
    ) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            pointer: pointer.into(),
            currency_symbol: currency_symbol.into(),
            timeout,
            credentials,
        }
    }
}

#[async_trait]
impl Sampler for HttpSampler {
    async fn current_price(&self) -> Result<String, SampleError> {
        debug!("Requesting price from {}", self.url);

        let mut request = self.client.get(&self.url).timeout(self.timeout);
        if let Some(access) = &self.credentials.access {
            request = request.basic_auth(access, self.credentials.key.as_ref());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SampleError::Timeout(self.timeout)
            } else {
                SampleError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SampleError::Rejected(format!("HTTP {}: {}", status, body)));
        }

        let payload: Value = response.json().await?;
        extract_price(&payload, &self.pointer, &self.currency_symbol)
    }
}
