use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    domain::{
        Invoice, InvoiceStatus, Payment, PaymentActivity, PaymentActivityKind, PaymentMethod,
        PaymentStatus,
    },
    error::{AppError, Result},
    payments::GatewayNotification,
    repository::{InvoiceRepository, PaymentRepository},
};

pub struct PaymentService {
    payment_repo: Arc<dyn PaymentRepository>,
    invoice_repo: Arc<dyn InvoiceRepository>,
}

impl PaymentService {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository>,
        invoice_repo: Arc<dyn InvoiceRepository>,
    ) -> Self {
        Self {
            payment_repo,
            invoice_repo,
        }
    }

    /// Creates the pending payment a gateway redirect is about to
    /// settle, plus its Initiated audit row. The returned payment's id
    /// is the correlation key the gateway echoes back in notifications.
    pub async fn initiate(
        &self,
        club_id: Uuid,
        invoice_id: Uuid,
        method: PaymentMethod,
    ) -> Result<(Payment, Invoice)> {
        let invoice = self
            .invoice_repo
            .find_by_id(club_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))?;

        if invoice.status == InvoiceStatus::Paid {
            return Err(AppError::Conflict("Invoice is already paid".to_string()));
        }
        if invoice.status == InvoiceStatus::Cancelled {
            return Err(AppError::Conflict("Invoice is cancelled".to_string()));
        }

        let payment = self
            .payment_repo
            .create(Payment {
                id: Uuid::new_v4(),
                club_id,
                invoice_id: Some(invoice_id),
                amount_cents: invoice.total_cents,
                method,
                status: PaymentStatus::Pending,
                gateway_tx_id: None,
                metadata: serde_json::json!({}),
                processed_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await?;

        self.payment_repo
            .append_activity(PaymentActivity {
                id: Uuid::new_v4(),
                payment_id: payment.id,
                club_id,
                kind: PaymentActivityKind::Initiated,
                message: format!("Payment initiated for invoice {}", invoice.invoice_number),
                gateway_tx_id: None,
                created_at: Utc::now(),
            })
            .await?;

        Ok((payment, invoice))
    }

    /// Applies a verified gateway notification to the payment and its
    /// invoice. The caller has already authenticated the notification;
    /// everything from here that fails unexpectedly must surface as a
    /// 5xx so the gateway redelivers.
    pub async fn reconcile(&self, notification: GatewayNotification) -> Result<Payment> {
        let payment = self
            .payment_repo
            .find_for_reconciliation(
                notification.payment_id,
                notification.club_id,
                notification.invoice_id,
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        // Gateways redeliver. A notification whose transaction id and
        // status we have already applied is acknowledged as-is, with no
        // second activity row and no re-mutation.
        if payment.status.is_terminal()
            && payment.status == notification.status
            && payment.gateway_tx_id.as_deref() == Some(notification.gateway_tx_id.as_str())
        {
            tracing::info!(
                payment_id = %payment.id,
                gateway_tx_id = %notification.gateway_tx_id,
                "duplicate gateway notification ignored"
            );
            return Ok(payment);
        }

        // A Pending notification carries nothing to apply, whatever
        // state we are in; acknowledge so the gateway stops resending.
        if notification.status == PaymentStatus::Pending {
            return Ok(payment);
        }

        if !payment.status.can_transition_to(notification.status) {
            return Err(AppError::Conflict(format!(
                "Payment is {:?} and cannot move to {:?}",
                payment.status, notification.status
            )));
        }

        let metadata = merge_metadata(&payment.metadata, &notification.metadata);
        let now = Utc::now();

        let updated = self
            .payment_repo
            .update_reconciled(
                payment.id,
                notification.status,
                Some(notification.gateway_tx_id.clone()),
                now,
                metadata,
            )
            .await?;

        match notification.status {
            PaymentStatus::Completed => {
                let paid_amount = notification.amount_cents.unwrap_or(payment.amount_cents);
                self.invoice_repo
                    .mark_paid(notification.invoice_id, now, paid_amount)
                    .await?;

                self.append_activity(
                    &updated,
                    PaymentActivityKind::Completed,
                    format!(
                        "Payment of {} completed via {:?}",
                        format_amount(paid_amount),
                        notification.gateway
                    ),
                    &notification,
                )
                .await?;
            }
            PaymentStatus::Failed => {
                // The invoice stays payable; only the payment attempt
                // is marked failed.
                let reason = notification
                    .reason
                    .clone()
                    .unwrap_or_else(|| notification.raw_status.clone());
                self.append_activity(
                    &updated,
                    PaymentActivityKind::Failed,
                    format!("Payment failed: {}", reason),
                    &notification,
                )
                .await?;
            }
            PaymentStatus::Cancelled => {
                self.append_activity(
                    &updated,
                    PaymentActivityKind::Cancelled,
                    "Payment cancelled by the buyer or gateway".to_string(),
                    &notification,
                )
                .await?;
            }
            PaymentStatus::Pending => unreachable!("handled above"),
        }

        Ok(updated)
    }

    /// Manual settlement recorded by an admin (EFT reference, cash at
    /// the front desk). Same invoice side effects as a gateway
    /// completion.
    pub async fn record_manual_payment(
        &self,
        club_id: Uuid,
        invoice_id: Uuid,
        amount_cents: i64,
        method: PaymentMethod,
        reference: Option<String>,
    ) -> Result<Payment> {
        let invoice = self
            .invoice_repo
            .find_by_id(club_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))?;

        if invoice.status == InvoiceStatus::Paid {
            return Err(AppError::Conflict("Invoice is already paid".to_string()));
        }

        let now = Utc::now();
        let payment = self
            .payment_repo
            .create(Payment {
                id: Uuid::new_v4(),
                club_id,
                invoice_id: Some(invoice_id),
                amount_cents,
                method,
                status: PaymentStatus::Completed,
                gateway_tx_id: reference.clone(),
                metadata: serde_json::json!({}),
                processed_at: Some(now),
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.invoice_repo.mark_paid(invoice_id, now, amount_cents).await?;

        self.payment_repo
            .append_activity(PaymentActivity {
                id: Uuid::new_v4(),
                payment_id: payment.id,
                club_id,
                kind: PaymentActivityKind::Completed,
                message: format!(
                    "Manual payment of {} recorded for invoice {}",
                    format_amount(amount_cents),
                    invoice.invoice_number
                ),
                gateway_tx_id: reference,
                created_at: now,
            })
            .await?;

        Ok(payment)
    }

    async fn append_activity(
        &self,
        payment: &Payment,
        kind: PaymentActivityKind,
        message: String,
        notification: &GatewayNotification,
    ) -> Result<()> {
        self.payment_repo
            .append_activity(PaymentActivity {
                id: Uuid::new_v4(),
                payment_id: payment.id,
                club_id: payment.club_id,
                kind,
                message,
                gateway_tx_id: Some(notification.gateway_tx_id.clone()),
                created_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}

/// Merge, not replace: diagnostic fields from earlier notifications
/// survive later ones.
fn merge_metadata(existing: &serde_json::Value, incoming: &serde_json::Value) -> serde_json::Value {
    match (existing.as_object(), incoming.as_object()) {
        (Some(existing), Some(incoming)) => {
            let mut merged = existing.clone();
            for (key, value) in incoming {
                merged.insert(key.clone(), value.clone());
            }
            serde_json::Value::Object(merged)
        }
        (None, Some(incoming)) => serde_json::Value::Object(incoming.clone()),
        _ => existing.clone(),
    }
}

fn format_amount(cents: i64) -> String {
    format!("R{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_merges_rather_than_replaces() {
        let existing = serde_json::json!({"pf_payment_id": "1", "amount_fee": "5.00"});
        let incoming = serde_json::json!({"pf_payment_id": "1", "payment_status": "COMPLETE"});

        let merged = merge_metadata(&existing, &incoming);
        assert_eq!(merged["amount_fee"], "5.00");
        assert_eq!(merged["payment_status"], "COMPLETE");
    }
}
