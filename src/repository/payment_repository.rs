use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentActivity, PaymentActivityKind, PaymentMethod, PaymentStatus},
    error::{AppError, Result},
    repository::PaymentRepository,
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    club_id: String,
    invoice_id: Option<String>,
    amount_cents: i64,
    method: String,
    status: String,
    gateway_tx_id: Option<String>,
    metadata: String,
    processed_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct PaymentActivityRow {
    id: String,
    payment_id: String,
    club_id: String,
    kind: String,
    message: String,
    gateway_tx_id: Option<String>,
    created_at: NaiveDateTime,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            club_id: Uuid::parse_str(&row.club_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            invoice_id: row
                .invoice_id
                .map(|s| Uuid::parse_str(&s).map_err(|e| AppError::Database(e.to_string())))
                .transpose()?,
            amount_cents: row.amount_cents,
            method: Self::parse_payment_method(&row.method)?,
            status: Self::parse_payment_status(&row.status)?,
            gateway_tx_id: row.gateway_tx_id,
            metadata: serde_json::from_str(&row.metadata)
                .map_err(|e| AppError::Database(format!("Invalid payment metadata: {}", e)))?,
            processed_at: row
                .processed_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_activity(row: PaymentActivityRow) -> Result<PaymentActivity> {
        Ok(PaymentActivity {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            payment_id: Uuid::parse_str(&row.payment_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            club_id: Uuid::parse_str(&row.club_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            kind: Self::parse_activity_kind(&row.kind)?,
            message: row.message,
            gateway_tx_id: row.gateway_tx_id,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    fn parse_payment_status(s: &str) -> Result<PaymentStatus> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Completed" => Ok(PaymentStatus::Completed),
            "Failed" => Ok(PaymentStatus::Failed),
            "Cancelled" => Ok(PaymentStatus::Cancelled),
            _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
        }
    }

    fn payment_status_to_str(status: &PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cancelled => "Cancelled",
        }
    }

    fn parse_payment_method(s: &str) -> Result<PaymentMethod> {
        match s {
            "PayFast" => Ok(PaymentMethod::PayFast),
            "Yoco" => Ok(PaymentMethod::Yoco),
            "Eft" => Ok(PaymentMethod::Eft),
            "Manual" => Ok(PaymentMethod::Manual),
            _ => Err(AppError::Database(format!("Invalid payment method: {}", s))),
        }
    }

    fn payment_method_to_str(method: &PaymentMethod) -> &'static str {
        match method {
            PaymentMethod::PayFast => "PayFast",
            PaymentMethod::Yoco => "Yoco",
            PaymentMethod::Eft => "Eft",
            PaymentMethod::Manual => "Manual",
        }
    }

    fn parse_activity_kind(s: &str) -> Result<PaymentActivityKind> {
        match s {
            "Initiated" => Ok(PaymentActivityKind::Initiated),
            "Completed" => Ok(PaymentActivityKind::Completed),
            "Failed" => Ok(PaymentActivityKind::Failed),
            "Cancelled" => Ok(PaymentActivityKind::Cancelled),
            _ => Err(AppError::Database(format!("Invalid activity kind: {}", s))),
        }
    }

    fn activity_kind_to_str(kind: &PaymentActivityKind) -> &'static str {
        match kind {
            PaymentActivityKind::Initiated => "Initiated",
            PaymentActivityKind::Completed => "Completed",
            PaymentActivityKind::Failed => "Failed",
            PaymentActivityKind::Cancelled => "Cancelled",
        }
    }

    async fn fetch_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, club_id, invoice_id, amount_cents, method, status,
                   gateway_tx_id, metadata, processed_at, created_at, updated_at
            FROM payments
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        let metadata = serde_json::to_string(&payment.metadata)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, club_id, invoice_id, amount_cents, method, status,
                gateway_tx_id, metadata, processed_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.club_id.to_string())
        .bind(payment.invoice_id.map(|i| i.to_string()))
        .bind(payment.amount_cents)
        .bind(Self::payment_method_to_str(&payment.method))
        .bind(Self::payment_status_to_str(&payment.status))
        .bind(&payment.gateway_tx_id)
        .bind(&metadata)
        .bind(payment.processed_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.fetch_by_id(payment.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created payment".to_string()))
    }

    async fn find_by_id(&self, club_id: Uuid, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, club_id, invoice_id, amount_cents, method, status,
                   gateway_tx_id, metadata, processed_at, created_at, updated_at
            FROM payments
            WHERE id = ? AND club_id = ?
            "#,
        )
        .bind(id.to_string())
        .bind(club_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_for_reconciliation(
        &self,
        id: Uuid,
        club_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, club_id, invoice_id, amount_cents, method, status,
                   gateway_tx_id, metadata, processed_at, created_at, updated_at
            FROM payments
            WHERE id = ? AND club_id = ? AND invoice_id = ?
            "#,
        )
        .bind(id.to_string())
        .bind(club_id.to_string())
        .bind(invoice_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, club_id, invoice_id, amount_cents, method, status,
                   gateway_tx_id, metadata, processed_at, created_at, updated_at
            FROM payments
            WHERE invoice_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(invoice_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn update_reconciled(
        &self,
        id: Uuid,
        status: PaymentStatus,
        gateway_tx_id: Option<String>,
        processed_at: DateTime<Utc>,
        metadata: serde_json::Value,
    ) -> Result<Payment> {
        let metadata = serde_json::to_string(&metadata)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                gateway_tx_id = COALESCE(?, gateway_tx_id),
                processed_at = ?,
                metadata = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Self::payment_status_to_str(&status))
        .bind(&gateway_tx_id)
        .bind(processed_at.naive_utc())
        .bind(&metadata)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.fetch_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated payment".to_string()))
    }

    async fn append_activity(&self, activity: PaymentActivity) -> Result<PaymentActivity> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payment_activities (
                id, payment_id, club_id, kind, message, gateway_tx_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(activity.id.to_string())
        .bind(activity.payment_id.to_string())
        .bind(activity.club_id.to_string())
        .bind(Self::activity_kind_to_str(&activity.kind))
        .bind(&activity.message)
        .bind(&activity.gateway_tx_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(activity)
    }

    async fn list_activities(&self, payment_id: Uuid) -> Result<Vec<PaymentActivity>> {
        let rows = sqlx::query_as::<_, PaymentActivityRow>(
            r#"
            SELECT id, payment_id, club_id, kind, message, gateway_tx_id, created_at
            FROM payment_activities
            WHERE payment_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(payment_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_activity).collect()
    }

    async fn count_by_status(&self, club_id: Uuid) -> Result<Vec<(PaymentStatus, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, COUNT(*) FROM payments
            WHERE club_id = ?
            GROUP BY status
            "#,
        )
        .bind(club_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|(s, n)| Ok((Self::parse_payment_status(&s)?, n)))
            .collect()
    }
}
