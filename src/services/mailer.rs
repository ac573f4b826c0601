use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::AppConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub to: String,
    pub cc: Option<String>,
    pub subject: String,
    pub body_html: String,
    pub attachment: Option<Attachment>,
}

/// Sends a finalized receipt. Errors are human-readable and never carry
/// credentials.
#[async_trait]
pub trait ReceiptDelivery: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), String>;
}

/// Delivery through the Resend HTTP API.
pub struct ResendDelivery {
    http_client: Client,
    api_key: String,
    from_address: String,
}

impl ResendDelivery {
    pub fn new(http_client: Client, api_key: String, from_address: String) -> Self {
        Self {
            http_client,
            api_key,
            from_address,
        }
    }

    fn payload(&self, email: &OutboundEmail) -> Value {
        let mut payload = json!({
            "from": self.from_address,
            "to": [email.to],
            "subject": email.subject,
            "html": email.body_html,
        });
        if let Some(cc) = email.cc.as_deref().filter(|cc| !cc.trim().is_empty()) {
            payload["cc"] = json!([cc]);
        }
        if let Some(attachment) = &email.attachment {
            payload["attachments"] = json!([{
                "filename": attachment.filename,
                "content": STANDARD.encode(&attachment.content),
            }]);
        }
        payload
    }
}

#[async_trait]
impl ReceiptDelivery for ResendDelivery {
    async fn send(&self, email: &OutboundEmail) -> Result<(), String> {
        let response = self
            .http_client
            .post("https://api.resend.com/emails")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.payload(email))
            .send()
            .await
            .map_err(|error| {
                tracing::error!(error = %error, "Resend API request failed");
                "Resend API request failed.".to_string()
            })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .unwrap_or(json!({"error": "failed to parse response"}));

        if status.is_success() {
            tracing::info!(to = %email.to, id = ?body.get("id"), "Receipt email sent");
            return Ok(());
        }
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Resend API error");
        Err(format!("Resend API error ({status}): {message}"))
    }
}

/// Testing mode: logs the message and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledDelivery;

#[async_trait]
impl ReceiptDelivery for DisabledDelivery {
    async fn send(&self, email: &OutboundEmail) -> Result<(), String> {
        tracing::info!(
            to = %email.to,
            cc = ?email.cc,
            subject = %email.subject,
            "Receipt delivery disabled; skipping send"
        );
        Ok(())
    }
}

/// Pick the delivery channel from configuration. Without an API key the
/// service falls back to testing mode.
pub fn delivery_from_config(
    config: &AppConfig,
    http_client: Client,
) -> std::sync::Arc<dyn ReceiptDelivery> {
    match config.resend_api_key.as_deref() {
        Some(api_key) if config.receipt_delivery_enabled => std::sync::Arc::new(
            ResendDelivery::new(http_client, api_key.to_string(), config.email_from_address.clone()),
        ),
        _ => {
            if config.receipt_delivery_enabled {
                tracing::warn!("RESEND_API_KEY not configured; receipt delivery disabled");
            }
            std::sync::Arc::new(DisabledDelivery)
        }
    }
}
