use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Invoice, InvoiceItem, InvoiceItemType, InvoiceStatus},
    error::{is_unique_violation, AppError, Result},
    repository::{InvoicePeriodTotals, InvoiceRepository},
};

#[derive(FromRow)]
struct InvoiceRow {
    id: String,
    club_id: String,
    payer_id: String,
    invoice_number: String,
    month: i64,
    year: i64,
    status: String,
    due_date: NaiveDate,
    subtotal_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    paid_at: Option<NaiveDateTime>,
    paid_amount_cents: Option<i64>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct InvoiceItemRow {
    id: String,
    invoice_id: String,
    member_id: Option<String>,
    description: String,
    item_type: String,
    unit_amount_cents: i64,
    quantity: i64,
    created_at: NaiveDateTime,
}

const INVOICE_COLUMNS: &str = r#"
    id, club_id, payer_id, invoice_number, month, year, status, due_date,
    subtotal_cents, discount_cents, total_cents, paid_at, paid_amount_cents,
    created_at, updated_at
"#;

pub struct SqliteInvoiceRepository {
    pool: SqlitePool,
}

impl SqliteInvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_invoice(row: InvoiceRow) -> Result<Invoice> {
        Ok(Invoice {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            club_id: Uuid::parse_str(&row.club_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            payer_id: Uuid::parse_str(&row.payer_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            invoice_number: row.invoice_number,
            month: row.month as u32,
            year: row.year as i32,
            status: Self::parse_invoice_status(&row.status)?,
            due_date: row.due_date,
            subtotal_cents: row.subtotal_cents,
            discount_cents: row.discount_cents,
            total_cents: row.total_cents,
            paid_at: row
                .paid_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            paid_amount_cents: row.paid_amount_cents,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_item(row: InvoiceItemRow) -> Result<InvoiceItem> {
        Ok(InvoiceItem {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            invoice_id: Uuid::parse_str(&row.invoice_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            member_id: row
                .member_id
                .map(|s| Uuid::parse_str(&s).map_err(|e| AppError::Database(e.to_string())))
                .transpose()?,
            description: row.description,
            item_type: Self::parse_item_type(&row.item_type)?,
            unit_amount_cents: row.unit_amount_cents,
            quantity: row.quantity,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    fn parse_invoice_status(s: &str) -> Result<InvoiceStatus> {
        match s {
            "Pending" => Ok(InvoiceStatus::Pending),
            "Paid" => Ok(InvoiceStatus::Paid),
            "Overdue" => Ok(InvoiceStatus::Overdue),
            "Cancelled" => Ok(InvoiceStatus::Cancelled),
            _ => Err(AppError::Database(format!("Invalid invoice status: {}", s))),
        }
    }

    fn invoice_status_to_str(status: &InvoiceStatus) -> &'static str {
        match status {
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::Overdue => "Overdue",
            InvoiceStatus::Cancelled => "Cancelled",
        }
    }

    fn parse_item_type(s: &str) -> Result<InvoiceItemType> {
        match s {
            "MonthlyFee" => Ok(InvoiceItemType::MonthlyFee),
            "Discount" => Ok(InvoiceItemType::Discount),
            "OnceOff" => Ok(InvoiceItemType::OnceOff),
            "Other" => Ok(InvoiceItemType::Other),
            _ => Err(AppError::Database(format!("Invalid item type: {}", s))),
        }
    }

    fn item_type_to_str(item_type: &InvoiceItemType) -> &'static str {
        match item_type {
            InvoiceItemType::MonthlyFee => "MonthlyFee",
            InvoiceItemType::Discount => "Discount",
            InvoiceItemType::OnceOff => "OnceOff",
            InvoiceItemType::Other => "Other",
        }
    }

    async fn fetch_by_id(&self, id: Uuid) -> Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE id = ?",
            INVOICE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_invoice(r)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl InvoiceRepository for SqliteInvoiceRepository {
    async fn create_with_items(
        &self,
        invoice: Invoice,
        items: Vec<InvoiceItem>,
    ) -> Result<Invoice> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let now = Utc::now().naive_utc();

        // The UNIQUE index on (club_id, payer_id, month, year) is the
        // real duplicate-period guard; the pre-check in the service is
        // only there for a friendlier error on the common path.
        let insert = sqlx::query(
            r#"
            INSERT INTO invoices (
                id, club_id, payer_id, invoice_number, month, year, status,
                due_date, subtotal_cents, discount_cents, total_cents,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(invoice.id.to_string())
        .bind(invoice.club_id.to_string())
        .bind(invoice.payer_id.to_string())
        .bind(&invoice.invoice_number)
        .bind(invoice.month as i64)
        .bind(invoice.year as i64)
        .bind(Self::invoice_status_to_str(&invoice.status))
        .bind(invoice.due_date)
        .bind(invoice.subtotal_cents)
        .bind(invoice.discount_cents)
        .bind(invoice.total_cents)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert {
            return Err(if is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "An invoice already exists for this payer for {}/{}",
                    invoice.month, invoice.year
                ))
            } else {
                AppError::Database(e.to_string())
            });
        }

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    id, invoice_id, member_id, description, item_type,
                    unit_amount_cents, quantity, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(item.id.to_string())
            .bind(invoice.id.to_string())
            .bind(item.member_id.map(|m| m.to_string()))
            .bind(&item.description)
            .bind(Self::item_type_to_str(&item.item_type))
            .bind(item.unit_amount_cents)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.fetch_by_id(invoice.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created invoice".to_string()))
    }

    async fn find_by_id(&self, club_id: Uuid, id: Uuid) -> Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE id = ? AND club_id = ?",
            INVOICE_COLUMNS
        ))
        .bind(id.to_string())
        .bind(club_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_invoice(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_period(
        &self,
        club_id: Uuid,
        payer_id: Uuid,
        month: u32,
        year: i32,
    ) -> Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE club_id = ? AND payer_id = ? AND month = ? AND year = ?",
            INVOICE_COLUMNS
        ))
        .bind(club_id.to_string())
        .bind(payer_id.to_string())
        .bind(month as i64)
        .bind(year as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_invoice(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, club_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {} FROM invoices
            WHERE club_id = ?
            ORDER BY year DESC, month DESC, created_at DESC
            LIMIT ? OFFSET ?
            "#,
            INVOICE_COLUMNS
        ))
        .bind(club_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_invoice).collect()
    }

    async fn list_for_payer(&self, club_id: Uuid, payer_id: Uuid) -> Result<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {} FROM invoices
            WHERE club_id = ? AND payer_id = ?
            ORDER BY year DESC, month DESC
            "#,
            INVOICE_COLUMNS
        ))
        .bind(club_id.to_string())
        .bind(payer_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_invoice).collect()
    }

    async fn list_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>> {
        let rows = sqlx::query_as::<_, InvoiceItemRow>(
            r#"
            SELECT id, invoice_id, member_id, description, item_type,
                   unit_amount_cents, quantity, created_at
            FROM invoice_items
            WHERE invoice_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(invoice_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn add_item(&self, item: InvoiceItem) -> Result<InvoiceItem> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                id, invoice_id, member_id, description, item_type,
                unit_amount_cents, quantity, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.id.to_string())
        .bind(item.invoice_id.to_string())
        .bind(item.member_id.map(|m| m.to_string()))
        .bind(&item.description)
        .bind(Self::item_type_to_str(&item.item_type))
        .bind(item.unit_amount_cents)
        .bind(item.quantity)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(item)
    }

    async fn delete_item(&self, invoice_id: Uuid, item_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM invoice_items WHERE id = ? AND invoice_id = ?")
            .bind(item_id.to_string())
            .bind(invoice_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Invoice item not found".to_string()));
        }

        Ok(())
    }

    async fn update_totals(
        &self,
        id: Uuid,
        subtotal_cents: i64,
        discount_cents: i64,
        total_cents: i64,
    ) -> Result<Invoice> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE invoices
            SET subtotal_cents = ?, discount_cents = ?, total_cents = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(subtotal_cents)
        .bind(discount_cents)
        .bind(total_cents)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.fetch_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated invoice".to_string()))
    }

    async fn mark_paid(
        &self,
        id: Uuid,
        paid_at: DateTime<Utc>,
        paid_amount_cents: i64,
    ) -> Result<Invoice> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'Paid', paid_at = ?, paid_amount_cents = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(paid_at.naive_utc())
        .bind(paid_amount_cents)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.fetch_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated invoice".to_string()))
    }

    async fn set_status(&self, id: Uuid, status: InvoiceStatus) -> Result<Invoice> {
        let now = Utc::now().naive_utc();

        sqlx::query("UPDATE invoices SET status = ?, updated_at = ? WHERE id = ?")
            .bind(Self::invoice_status_to_str(&status))
            .bind(now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.fetch_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated invoice".to_string()))
    }

    async fn count_for_period(&self, club_id: Uuid, year: i32, month: u32) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM invoices WHERE club_id = ? AND year = ? AND month = ?",
        )
        .bind(club_id.to_string())
        .bind(year as i64)
        .bind(month as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count)
    }

    async fn totals_for_period(
        &self,
        club_id: Uuid,
        month: u32,
        year: i32,
    ) -> Result<InvoicePeriodTotals> {
        let row = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(total_cents), 0),
                COALESCE(SUM(CASE WHEN status = 'Paid' THEN COALESCE(paid_amount_cents, total_cents) ELSE 0 END), 0)
            FROM invoices
            WHERE club_id = ? AND month = ? AND year = ? AND status != 'Cancelled'
            "#,
        )
        .bind(club_id.to_string())
        .bind(month as i64)
        .bind(year as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let (invoice_count, invoiced_cents, paid_cents) = row;

        Ok(InvoicePeriodTotals {
            invoice_count,
            invoiced_cents,
            paid_cents,
            outstanding_cents: invoiced_cents - paid_cents,
        })
    }

    async fn list_overdue(&self, club_id: Uuid, as_of: NaiveDate) -> Result<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {} FROM invoices
            WHERE club_id = ? AND status = 'Pending' AND due_date < ?
            ORDER BY due_date
            "#,
            INVOICE_COLUMNS
        ))
        .bind(club_id.to_string())
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_invoice).collect()
    }
}
