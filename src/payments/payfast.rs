use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    config::PayFastConfig,
    domain::{Invoice, Payment, PaymentMethod, PaymentStatus, User},
    error::{AppError, Result},
    payments::GatewayNotification,
};

type HmacSha256 = Hmac<Sha256>;

/// PayFast-style gateway: the buyer is redirected to the gateway with a
/// signed parameter set, and the gateway later POSTs an ITN (Instant
/// Transaction Notification) back to us as url-encoded form fields,
/// signed the same way.
pub struct PayFastClient {
    merchant_id: String,
    merchant_key: String,
    passphrase: Option<String>,
    host: String,
    validate_with_gateway: bool,
    http: reqwest::Client,
}

impl PayFastClient {
    pub fn from_config(config: &PayFastConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        match (&config.merchant_id, &config.merchant_key) {
            (Some(merchant_id), Some(merchant_key)) => Some(Self {
                merchant_id: merchant_id.clone(),
                merchant_key: merchant_key.clone(),
                passphrase: config.passphrase.clone(),
                host: config.host.clone(),
                validate_with_gateway: config.validate_with_gateway,
                http: reqwest::Client::new(),
            }),
            _ => {
                tracing::warn!("PayFast enabled but missing merchant configuration");
                None
            }
        }
    }

    /// Signed redirect URL for one pending payment. The correlation
    /// fields (m_payment_id, custom_str1, custom_str2) come back to us
    /// verbatim in the ITN and are the only way to find our rows again.
    pub fn build_redirect_url(
        &self,
        payment: &Payment,
        invoice: &Invoice,
        payer: &User,
        return_url: &str,
        cancel_url: &str,
        notify_url: &str,
    ) -> Result<String> {
        let invoice_id = payment
            .invoice_id
            .ok_or_else(|| AppError::BadRequest("Payment has no invoice".to_string()))?;

        let mut fields = BTreeMap::new();
        fields.insert("merchant_id".to_string(), self.merchant_id.clone());
        fields.insert("merchant_key".to_string(), self.merchant_key.clone());
        fields.insert("return_url".to_string(), return_url.to_string());
        fields.insert("cancel_url".to_string(), cancel_url.to_string());
        fields.insert("notify_url".to_string(), notify_url.to_string());
        fields.insert("email_address".to_string(), payer.email.clone());
        fields.insert("m_payment_id".to_string(), payment.id.to_string());
        fields.insert("amount".to_string(), format_cents(payment.amount_cents));
        fields.insert(
            "item_name".to_string(),
            format!("Invoice {}", invoice.invoice_number),
        );
        fields.insert("custom_str1".to_string(), invoice_id.to_string());
        fields.insert("custom_str2".to_string(), payment.club_id.to_string());

        let signature = self.sign(&fields);
        fields.insert("signature".to_string(), signature);

        let query: Vec<String> = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();

        Ok(format!("{}/eng/process?{}", self.host, query.join("&")))
    }

    /// Signature over the canonicalized field set: keys sorted, empty
    /// values and the signature field itself skipped, values
    /// url-encoded, passphrase appended when configured. Keyed with the
    /// merchant key so a forged POST without it cannot produce a valid
    /// signature even over an unchanged payload.
    fn sign(&self, fields: &BTreeMap<String, String>) -> String {
        let mut canonical: Vec<String> = fields
            .iter()
            .filter(|(k, v)| k.as_str() != "signature" && !v.is_empty())
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();

        if let Some(passphrase) = &self.passphrase {
            canonical.push(format!("passphrase={}", urlencoding::encode(passphrase)));
        }

        let payload = canonical.join("&");

        let mut mac = HmacSha256::new_from_slice(self.merchant_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verifies an inbound ITN: signature first, then the merchant id
    /// embedded in the payload against our configuration.
    pub fn verify_itn(&self, fields: &BTreeMap<String, String>) -> Result<()> {
        let supplied = fields
            .get("signature")
            .ok_or_else(|| AppError::BadRequest("Missing signature".to_string()))?;

        let expected = self.sign(fields);
        if expected.as_bytes().ct_eq(supplied.as_bytes()).unwrap_u8() != 1 {
            return Err(AppError::BadRequest("Invalid signature".to_string()));
        }

        match fields.get("merchant_id") {
            Some(id) if *id == self.merchant_id => Ok(()),
            _ => Err(AppError::BadRequest("Merchant id mismatch".to_string())),
        }
    }

    /// Server-to-server confirmation: replay the raw notification body
    /// to the gateway's validation endpoint, which answers with the
    /// literal VALID for notifications it actually sent. Guards against
    /// a forged client-side POST that somehow carried a valid
    /// signature.
    pub async fn confirm_with_gateway(&self, raw_body: &str) -> Result<()> {
        if !self.validate_with_gateway {
            return Ok(());
        }

        let response = self
            .http
            .post(format!("{}/eng/query/validate", self.host))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(raw_body.to_string())
            .send()
            .await
            .map_err(|e| AppError::External(format!("PayFast validation call failed: {}", e)))?;

        let body = response
            .text()
            .await
            .map_err(|e| AppError::External(format!("PayFast validation call failed: {}", e)))?;

        if body.trim() == "VALID" {
            Ok(())
        } else {
            Err(AppError::BadRequest(
                "Gateway did not confirm the notification".to_string(),
            ))
        }
    }

    /// Extracts the correlation fields and maps the gateway status.
    /// Missing correlation fields are a client error: the notification
    /// cannot be matched to anything we issued.
    pub fn parse_notification(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> Result<GatewayNotification> {
        let payment_id = parse_uuid_field(fields, "m_payment_id")?;
        let invoice_id = parse_uuid_field(fields, "custom_str1")?;
        let club_id = parse_uuid_field(fields, "custom_str2")?;

        let gateway_tx_id = fields
            .get("pf_payment_id")
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| AppError::BadRequest("Missing field: pf_payment_id".to_string()))?;

        let raw_status = fields.get("payment_status").cloned().unwrap_or_default();
        let status = map_payment_status(&raw_status);

        let amount_cents = fields
            .get("amount_gross")
            .and_then(|v| parse_cents(v));

        // Diagnostic fields worth keeping in the payment metadata bag.
        let mut metadata = serde_json::Map::new();
        for key in ["pf_payment_id", "payment_status", "amount_gross", "amount_fee", "amount_net"] {
            if let Some(value) = fields.get(key) {
                metadata.insert(key.to_string(), serde_json::Value::String(value.clone()));
            }
        }

        Ok(GatewayNotification {
            gateway: PaymentMethod::PayFast,
            payment_id,
            invoice_id,
            club_id,
            gateway_tx_id,
            status,
            raw_status,
            amount_cents,
            reason: fields.get("reason").filter(|v| !v.is_empty()).cloned(),
            metadata: serde_json::Value::Object(metadata),
        })
    }
}

/// The gateway's status vocabulary is free text; anything unrecognized
/// stays Pending rather than being dropped, so a later notification or
/// an operator can still settle the payment.
pub fn map_payment_status(raw: &str) -> PaymentStatus {
    match raw.to_ascii_uppercase().as_str() {
        "COMPLETE" => PaymentStatus::Completed,
        "PENDING" => PaymentStatus::Pending,
        "FAILED" => PaymentStatus::Failed,
        "CANCELLED" => PaymentStatus::Cancelled,
        other => {
            tracing::warn!(status = other, "unrecognized PayFast payment status");
            PaymentStatus::Pending
        }
    }
}

fn parse_uuid_field(fields: &BTreeMap<String, String>, key: &str) -> Result<Uuid> {
    let value = fields
        .get(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Missing field: {}", key)))?;

    Uuid::parse_str(value).map_err(|_| AppError::BadRequest(format!("Invalid field: {}", key)))
}

fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// "650.00" -> 65000. The gateway sends decimal strings.
fn parse_cents(value: &str) -> Option<i64> {
    let (rand, cents) = match value.split_once('.') {
        Some((r, c)) => (r, c),
        None => (value, "0"),
    };

    let rand: i64 = rand.trim().parse().ok()?;
    let cents: i64 = format!("{:0<2}", cents.trim()).get(..2)?.parse().ok()?;

    Some(rand * 100 + cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(passphrase: Option<&str>) -> PayFastClient {
        PayFastClient {
            merchant_id: "10000100".to_string(),
            merchant_key: "46f0cd694581a".to_string(),
            passphrase: passphrase.map(String::from),
            host: "https://sandbox.payfast.co.za".to_string(),
            validate_with_gateway: false,
            http: reqwest::Client::new(),
        }
    }

    fn itn_fields(client: &PayFastClient) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("merchant_id".to_string(), "10000100".to_string());
        fields.insert("m_payment_id".to_string(), Uuid::new_v4().to_string());
        fields.insert("pf_payment_id".to_string(), "1089250".to_string());
        fields.insert("custom_str1".to_string(), Uuid::new_v4().to_string());
        fields.insert("custom_str2".to_string(), Uuid::new_v4().to_string());
        fields.insert("payment_status".to_string(), "COMPLETE".to_string());
        fields.insert("amount_gross".to_string(), "650.00".to_string());
        let signature = client.sign(&fields);
        fields.insert("signature".to_string(), signature);
        fields
    }

    #[test]
    fn valid_signature_verifies() {
        let client = test_client(Some("jt7NOE43FZPn"));
        let fields = itn_fields(&client);
        assert!(client.verify_itn(&fields).is_ok());
    }

    #[test]
    fn tampered_amount_is_rejected() {
        let client = test_client(Some("jt7NOE43FZPn"));
        let mut fields = itn_fields(&client);
        fields.insert("amount_gross".to_string(), "0.01".to_string());
        assert!(client.verify_itn(&fields).is_err());
    }

    #[test]
    fn signature_requires_passphrase_knowledge() {
        let signer = test_client(None);
        let verifier = test_client(Some("jt7NOE43FZPn"));
        // Signed without the passphrase the verifier requires.
        let fields = itn_fields(&signer);
        assert!(verifier.verify_itn(&fields).is_err());
    }

    #[test]
    fn empty_fields_do_not_affect_the_signature() {
        let client = test_client(None);
        let mut fields = itn_fields(&client);
        fields.insert("custom_str3".to_string(), String::new());
        assert!(client.verify_itn(&fields).is_ok());
    }

    #[test]
    fn merchant_id_mismatch_is_rejected() {
        let client = test_client(None);
        let mut fields = itn_fields(&client);
        fields.insert("merchant_id".to_string(), "99999999".to_string());
        let signature = client.sign(&fields);
        fields.insert("signature".to_string(), signature);
        assert!(client.verify_itn(&fields).is_err());
    }

    #[test]
    fn status_mapping_defaults_to_pending() {
        assert_eq!(map_payment_status("COMPLETE"), PaymentStatus::Completed);
        assert_eq!(map_payment_status("complete"), PaymentStatus::Completed);
        assert_eq!(map_payment_status("CANCELLED"), PaymentStatus::Cancelled);
        assert_eq!(map_payment_status("SOMETHING_NEW"), PaymentStatus::Pending);
    }

    #[test]
    fn amount_parsing_handles_decimal_strings() {
        assert_eq!(parse_cents("650.00"), Some(65000));
        assert_eq!(parse_cents("650.5"), Some(65050));
        assert_eq!(parse_cents("650"), Some(65000));
        assert_eq!(parse_cents("not-money"), None);
    }

    #[test]
    fn missing_correlation_field_is_a_bad_request() {
        let client = test_client(None);
        let mut fields = itn_fields(&client);
        fields.remove("custom_str1");
        let err = client.parse_notification(&fields).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
