use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sns::config::Region;
use aws_sdk_sns::error::{DisplayErrorContext, ProvideErrorMetadata};
use log::info;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

/// Provider receipt for a delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: String,
    pub status_code: u16,
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider rejected message (status {status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Unexpected provider response: {0}")]
    Malformed(String),

    #[error("Provider unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str, destination: &str) -> Result<Delivery, NotifyError>;
}

/// Only logs the message. Used for dry runs.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str, destination: &str) -> Result<Delivery, NotifyError> {
        info!("[dry-run] would notify {}: {}", destination, message);
        Ok(Delivery {
            message_id: "dry-run".to_string(),
            status_code: 200,
        })
    }
}

/// POSTs `{"message", "destination"}` as JSON to a URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

fn webhook_message_id(body: &Value) -> Option<String> {
    ["message_id", "messageId", "id"]
        .iter()
        .find_map(|field| match body.get(*field) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &str, destination: &str) -> Result<Delivery, NotifyError> {
        let payload = json!({
            "message": message,
            "destination": destination,
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                detail: text,
            });
        }

        let message_id = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| webhook_message_id(&body))
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Delivery {
            message_id,
            status_code: status.as_u16(),
        })
    }
}

/// Telegram Bot API `sendMessage`; the destination is the chat id.
pub struct TelegramNotifier {
    client: Client,
    bot_token: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            bot_token: bot_token.into(),
        }
    }
}

fn telegram_delivery(status: u16, body: &Value) -> Result<Delivery, NotifyError> {
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let detail = body
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();
        return Err(NotifyError::Rejected { status, detail });
    }

    let message_id = body
        .pointer("/result/message_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| NotifyError::Malformed(body.to_string()))?;

    Ok(Delivery {
        message_id: message_id.to_string(),
        status_code: status,
    })
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str, destination: &str) -> Result<Delivery, NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        let payload = json!({
            "chat_id": destination,
            "text": message,
            "disable_web_page_preview": true
        });

        let response = self.client.post(&url).json(&payload).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).map_err(|_| NotifyError::Malformed(text))?;

        telegram_delivery(status, &body)
    }
}

pub const DEFAULT_SNS_REGION: &str = "us-east-1";

/// SMS through AWS SNS; the destination is an E.164 phone number.
/// Credentials come from the standard AWS provider chain.
pub struct SnsNotifier {
    region: String,
}

impl SnsNotifier {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

fn sns_delivery(message_id: Option<&str>) -> Result<Delivery, NotifyError> {
    message_id
        .map(|id| Delivery {
            message_id: id.to_string(),
            status_code: 200,
        })
        .ok_or_else(|| NotifyError::Malformed("publish response without MessageId".to_string()))
}

fn sns_failure(status: Option<u16>, detail: String) -> NotifyError {
    match status {
        Some(status) => NotifyError::Rejected { status, detail },
        None => NotifyError::Unreachable(detail),
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn send(&self, message: &str, destination: &str) -> Result<Delivery, NotifyError> {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .load()
            .await;
        let client = aws_sdk_sns::Client::new(&config);

        match client
            .publish()
            .phone_number(destination)
            .message(message)
            .send()
            .await
        {
            Ok(output) => sns_delivery(output.message_id()),
            Err(e) => {
                let status = e.raw_response().map(|response| response.status().as_u16());
                let detail = e
                    .as_service_error()
                    .and_then(|service| service.message().or_else(|| service.code()))
                    .map(str::to_string)
                    .unwrap_or_else(|| DisplayErrorContext(&e).to_string());
                Err(sns_failure(status, detail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_delivers() {
        let delivery = LogNotifier.send("DONE", "+15550100").await.unwrap();
        assert_eq!(delivery.message_id, "dry-run");
        assert_eq!(delivery.status_code, 200);
    }

    #[test]
    fn test_webhook_message_id_fields() {
        assert_eq!(
            webhook_message_id(&json!({"messageId": "abc"})),
            Some("abc".to_string())
        );
        assert_eq!(webhook_message_id(&json!({"id": 42})), Some("42".to_string()));
        assert_eq!(webhook_message_id(&json!({"ok": true})), None);
    }

    #[test]
    fn test_telegram_delivery_ok() {
        let body = json!({"ok": true, "result": {"message_id": 7}});
        assert_eq!(
            telegram_delivery(200, &body).unwrap(),
            Delivery {
                message_id: "7".to_string(),
                status_code: 200
            }
        );
    }

    #[test]
    fn test_telegram_delivery_rejected() {
        let body = json!({"ok": false, "description": "Bad Request: chat not found"});
        match telegram_delivery(400, &body) {
            Err(NotifyError::Rejected { status, detail }) => {
                assert_eq!(status, 400);
                assert_eq!(detail, "Bad Request: chat not found");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_telegram_delivery_missing_id() {
        let body = json!({"ok": true, "result": {}});
        assert!(matches!(
            telegram_delivery(200, &body),
            Err(NotifyError::Malformed(_))
        ));
    }

    #[test]
    fn test_sns_delivery_ok() {
        assert_eq!(
            sns_delivery(Some("5f3c0e8a-1d2b-4c6e-9f00-000000000001")).unwrap(),
            Delivery {
                message_id: "5f3c0e8a-1d2b-4c6e-9f00-000000000001".to_string(),
                status_code: 200
            }
        );
    }

    #[test]
    fn test_sns_delivery_missing_id() {
        assert!(matches!(sns_delivery(None), Err(NotifyError::Malformed(_))));
    }

    #[test]
    fn test_sns_failure_with_response() {
        match sns_failure(Some(400), "Invalid parameter: PhoneNumber".to_string()) {
            NotifyError::Rejected { status, detail } => {
                assert_eq!(status, 400);
                assert_eq!(detail, "Invalid parameter: PhoneNumber");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_sns_failure_without_response() {
        assert!(matches!(
            sns_failure(None, "dispatch failure".to_string()),
            NotifyError::Unreachable(_)
        ));
    }

    #[tokio::test]
    async fn test_webhook_transport_failure() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/notify");
        assert!(matches!(
            notifier.send("hi", "ops").await,
            Err(NotifyError::Transport(_))
        ));
    }
}
