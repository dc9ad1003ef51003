use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub club_id: Uuid,
    pub payer_id: Uuid,
    pub invoice_number: String,
    pub month: u32,
    pub year: i32,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_amount_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Line items and discounts may only change while the invoice is
    /// still pending; paid or cancelled invoices are immutable.
    pub fn is_editable(&self) -> bool {
        self.status == InvoiceStatus::Pending || self.status == InvoiceStatus::Overdue
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub member_id: Option<Uuid>,
    pub description: String,
    pub item_type: InvoiceItemType,
    pub unit_amount_cents: i64,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl InvoiceItem {
    pub fn line_total_cents(&self) -> i64 {
        self.unit_amount_cents * self.quantity
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvoiceItemType {
    MonthlyFee,
    Discount,
    OnceOff,
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoiceItem {
    pub member_id: Option<Uuid>,
    pub description: String,
    pub item_type: InvoiceItemType,
    pub unit_amount_cents: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Per-payer outcome of a club-wide generation run. One payer failing
/// (usually a duplicate period) must not abort the rest of the batch.
#[derive(Debug, Clone, Serialize)]
pub struct PayerInvoiceResult {
    pub payer_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub error: Option<String>,
}
