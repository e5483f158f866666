use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::monitor::price::format_price;

#[derive(Error, Debug)]
pub enum SampleError {
    #[error("WebSocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No price received within {0:?}")]
    Timeout(Duration),

    #[error("Price feed closed before a price was received")]
    Closed,

    #[error("No price found at '{0}'")]
    MissingField(String),

    #[error("Source rejected the request: {0}")]
    Rejected(String),
}

/// Produces the currently displayed price, e.g. `"$10,011"`.
#[async_trait]
pub trait Sampler: Send + Sync {
    async fn current_price(&self) -> Result<String, SampleError>;
}

/// Returns the same display string every time.
#[derive(Debug, Clone)]
pub struct FixedSampler {
    price: String,
}

impl FixedSampler {
    pub fn new(price: impl Into<String>) -> Self {
        Self {
            price: price.into(),
        }
    }
}

#[async_trait]
impl Sampler for FixedSampler {
    async fn current_price(&self) -> Result<String, SampleError> {
        Ok(self.price.clone())
    }
}

/// Source credentials, substituted into requests that need them.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub access: Option<String>,
    pub key: Option<String>,
}

impl Credentials {
    /// Replaces `{access}` and `{key}` placeholders.
    pub fn fill(&self, template: &str) -> String {
        template
            .replace("{access}", self.access.as_deref().unwrap_or_default())
            .replace("{key}", self.key.as_deref().unwrap_or_default())
    }
}

/// Reads the price at a JSON pointer. Strings are taken verbatim, numbers
/// are rendered as display strings with `symbol`.
pub fn extract_price(payload: &Value, pointer: &str, symbol: &str) -> Result<String, SampleError> {
    match payload.pointer(pointer) {
        Some(Value::String(s)) if s.chars().any(|c| c.is_ascii_digit()) => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(|whole| format_price(whole, symbol))
            .ok_or_else(|| SampleError::MissingField(pointer.to_string())),
        _ => Err(SampleError::MissingField(pointer.to_string())),
    }
}

/// Like [`extract_price`] for a raw text frame. Without a pointer the
/// whole frame is the price.
pub fn extract_from_text(
    text: &str,
    pointer: Option<&str>,
    symbol: &str,
) -> Result<String, SampleError> {
    match pointer {
        Some(pointer) => {
            let payload: Value = serde_json::from_str(text)?;
            extract_price(&payload, pointer, symbol)
        }
        None if text.chars().any(|c| c.is_ascii_digit()) => Ok(text.trim().to_string()),
        None => Err(SampleError::MissingField("<frame>".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fixed_sampler() {
        let sampler = FixedSampler::new("$10,011");
        assert_eq!(sampler.current_price().await.unwrap(), "$10,011");
    }

    #[test]
    fn test_extract_price_string_verbatim() {
        let payload = json!({"data": {"c": " $10,011 "}});
        assert_eq!(extract_price(&payload, "/data/c", "$").unwrap(), "$10,011");
    }

    #[test]
    fn test_extract_price_number_is_formatted() {
        let payload = json!({"price": 10011});
        assert_eq!(extract_price(&payload, "/price", "$").unwrap(), "$10,011");

        let payload = json!({"price": 10010.6});
        assert_eq!(extract_price(&payload, "/price", "€").unwrap(), "€10,011");
    }

    #[test]
    fn test_extract_price_missing() {
        let payload = json!({"status": "subscribed"});
        assert!(matches!(
            extract_price(&payload, "/price", "$"),
            Err(SampleError::MissingField(_))
        ));
        assert!(matches!(
            extract_price(&payload, "/status", "$"),
            Err(SampleError::MissingField(_))
        ));
    }

    #[test]
    fn test_extract_from_text() {
        assert_eq!(extract_from_text("$10,011\n", None, "$").unwrap(), "$10,011");
        assert!(extract_from_text("hello", None, "$").is_err());
        assert!(matches!(
            extract_from_text("not json", Some("/price"), "$"),
            Err(SampleError::Json(_))
        ));
        assert_eq!(
            extract_from_text(r#"{"price":"$9,990"}"#, Some("/price"), "$").unwrap(),
            "$9,990"
        );
    }

    #[test]
    fn test_credentials_fill() {
        let credentials = Credentials {
            access: Some("me@example.com".to_string()),
            key: Some("s3cret".to_string()),
        };
        assert_eq!(
            credentials.fill(r#"{"user":"{access}","pass":"{key}"}"#),
            r#"{"user":"me@example.com","pass":"s3cret"}"#
        );
        assert_eq!(Credentials::default().fill("{access}:{key}"), ":");
    }
}
