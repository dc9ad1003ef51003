use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    config::YocoConfig,
    domain::{Invoice, Payment, PaymentMethod, PaymentStatus},
    error::{AppError, Result},
    payments::GatewayNotification,
};

type HmacSha256 = Hmac<Sha256>;

// Webhooks older than this are refused outright; a replayed capture of
// a once-valid delivery should not still reconcile days later.
const WEBHOOK_TOLERANCE_SECS: i64 = 180;

/// Yoco-style gateway: a hosted checkout is created server-to-server
/// and the buyer is redirected to it; payment outcomes arrive as JSON
/// webhooks signed over `{id}.{timestamp}.{body}`.
pub struct YocoClient {
    secret_key: String,
    webhook_secret: String,
    host: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct CheckoutResponse {
    #[serde(rename = "redirectUrl")]
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    payload: WebhookPayload,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    id: String,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    metadata: serde_json::Value,
    #[serde(rename = "failureReason", default)]
    failure_reason: Option<String>,
}

impl YocoClient {
    pub fn from_config(config: &YocoConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        match (&config.secret_key, &config.webhook_secret) {
            (Some(secret_key), Some(webhook_secret)) => Some(Self {
                secret_key: secret_key.clone(),
                webhook_secret: webhook_secret.clone(),
                host: config.host.clone(),
                http: reqwest::Client::new(),
            }),
            _ => {
                tracing::warn!("Yoco enabled but missing configuration");
                None
            }
        }
    }

    /// Creates a hosted checkout for one pending payment and returns
    /// the redirect URL. The correlation ids ride along as metadata and
    /// come back verbatim in the webhook payload.
    pub async fn create_checkout(
        &self,
        payment: &Payment,
        invoice: &Invoice,
        success_url: &str,
        cancel_url: &str,
        failure_url: &str,
    ) -> Result<String> {
        let invoice_id = payment
            .invoice_id
            .ok_or_else(|| AppError::BadRequest("Payment has no invoice".to_string()))?;

        let body = json!({
            "amount": payment.amount_cents,
            "currency": "ZAR",
            "successUrl": success_url,
            "cancelUrl": cancel_url,
            "failureUrl": failure_url,
            "metadata": {
                "payment_id": payment.id.to_string(),
                "invoice_id": invoice_id.to_string(),
                "club_id": payment.club_id.to_string(),
                "invoice_number": invoice.invoice_number,
            },
        });

        let response = self
            .http
            .post(format!("{}/api/checkouts", self.host))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::External(format!("Yoco checkout failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::External(format!(
                "Yoco checkout failed: {} {}",
                status, detail
            )));
        }

        let checkout: CheckoutResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Yoco checkout failed: {}", e)))?;

        Ok(checkout.redirect_url)
    }

    /// Verifies a webhook delivery. The signed content is
    /// `{webhook-id}.{webhook-timestamp}.{raw body}`, the key is the
    /// base64 part of the webhook secret, the comparison constant-time.
    pub fn verify_webhook(
        &self,
        webhook_id: &str,
        webhook_timestamp: &str,
        signature_header: &str,
        raw_body: &str,
    ) -> Result<()> {
        let timestamp: i64 = webhook_timestamp
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid webhook timestamp".to_string()))?;

        if (Utc::now().timestamp() - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
            return Err(AppError::BadRequest("Webhook timestamp too old".to_string()));
        }

        let secret = self
            .webhook_secret
            .strip_prefix("whsec_")
            .unwrap_or(&self.webhook_secret);
        let key = base64::engine::general_purpose::STANDARD
            .decode(secret)
            .map_err(|_| AppError::Internal("Invalid webhook secret".to_string()))?;

        let signed_content = format!("{}.{}.{}", webhook_id, webhook_timestamp, raw_body);
        let mut mac =
            HmacSha256::new_from_slice(&key).expect("HMAC can take key of any size");
        mac.update(signed_content.as_bytes());
        let expected = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        // Header format: "v1,<base64 signature>" with possible
        // additional space-separated versions.
        let supplied = signature_header
            .split_whitespace()
            .filter_map(|part| part.split_once(','))
            .find(|(version, _)| *version == "v1")
            .map(|(_, sig)| sig)
            .ok_or_else(|| AppError::BadRequest("Malformed signature header".to_string()))?;

        if expected.as_bytes().ct_eq(supplied.as_bytes()).unwrap_u8() == 1 {
            Ok(())
        } else {
            Err(AppError::BadRequest("Invalid signature".to_string()))
        }
    }

    pub fn parse_webhook(&self, raw_body: &str) -> Result<GatewayNotification> {
        let envelope: WebhookEnvelope = serde_json::from_str(raw_body)
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook body: {}", e)))?;

        let payment_id = metadata_uuid(&envelope.payload.metadata, "payment_id")?;
        let invoice_id = metadata_uuid(&envelope.payload.metadata, "invoice_id")?;
        let club_id = metadata_uuid(&envelope.payload.metadata, "club_id")?;

        let status = map_event_type(&envelope.event_type);

        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "yoco_event_type".to_string(),
            serde_json::Value::String(envelope.event_type.clone()),
        );
        metadata.insert(
            "yoco_payment_id".to_string(),
            serde_json::Value::String(envelope.payload.id.clone()),
        );

        Ok(GatewayNotification {
            gateway: PaymentMethod::Yoco,
            payment_id,
            invoice_id,
            club_id,
            gateway_tx_id: envelope.payload.id,
            status,
            raw_status: envelope.event_type,
            amount_cents: envelope.payload.amount,
            reason: envelope.payload.failure_reason,
            metadata: serde_json::Value::Object(metadata),
        })
    }
}

/// Event-type to status table; unrecognized events stay Pending.
pub fn map_event_type(event_type: &str) -> PaymentStatus {
    match event_type {
        "payment.succeeded" => PaymentStatus::Completed,
        "payment.failed" => PaymentStatus::Failed,
        "payment.cancelled" => PaymentStatus::Cancelled,
        "payment.pending" => PaymentStatus::Pending,
        other => {
            tracing::warn!(event_type = other, "unrecognized Yoco event type");
            PaymentStatus::Pending
        }
    }
}

fn metadata_uuid(metadata: &serde_json::Value, key: &str) -> Result<Uuid> {
    let value = metadata
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::BadRequest(format!("Missing field: {}", key)))?;

    Uuid::parse_str(value).map_err(|_| AppError::BadRequest(format!("Invalid field: {}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> YocoClient {
        YocoClient {
            secret_key: "sk_test_xxx".to_string(),
            // "test-secret-key-material" base64-encoded
            webhook_secret: "whsec_dGVzdC1zZWNyZXQta2V5LW1hdGVyaWFs".to_string(),
            host: "https://payments.yoco.com".to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn sign(client: &YocoClient, id: &str, timestamp: &str, body: &str) -> String {
        let secret = client.webhook_secret.strip_prefix("whsec_").unwrap();
        let key = base64::engine::general_purpose::STANDARD.decode(secret).unwrap();
        let mut mac = HmacSha256::new_from_slice(&key).unwrap();
        mac.update(format!("{}.{}.{}", id, timestamp, body).as_bytes());
        format!(
            "v1,{}",
            base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
        )
    }

    #[test]
    fn valid_webhook_signature_verifies() {
        let client = test_client();
        let body = r#"{"type":"payment.succeeded"}"#;
        let timestamp = Utc::now().timestamp().to_string();
        let header = sign(&client, "evt_1", &timestamp, body);

        assert!(client.verify_webhook("evt_1", &timestamp, &header, body).is_ok());
    }

    #[test]
    fn modified_body_is_rejected() {
        let client = test_client();
        let timestamp = Utc::now().timestamp().to_string();
        let header = sign(&client, "evt_1", &timestamp, r#"{"amount":65000}"#);

        assert!(client
            .verify_webhook("evt_1", &timestamp, &header, r#"{"amount":1}"#)
            .is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let client = test_client();
        let body = r#"{"type":"payment.succeeded"}"#;
        let timestamp = (Utc::now().timestamp() - 600).to_string();
        let header = sign(&client, "evt_1", &timestamp, body);

        assert!(client.verify_webhook("evt_1", &timestamp, &header, body).is_err());
    }

    #[test]
    fn event_types_map_to_statuses() {
        assert_eq!(map_event_type("payment.succeeded"), PaymentStatus::Completed);
        assert_eq!(map_event_type("payment.failed"), PaymentStatus::Failed);
        assert_eq!(map_event_type("refund.succeeded"), PaymentStatus::Pending);
    }
}
