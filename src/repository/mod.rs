use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub mod club_repository;
pub mod fee_adjustment_repository;
pub mod invoice_repository;
pub mod member_repository;
pub mod payment_repository;

pub use club_repository::SqliteClubRepository;
pub use fee_adjustment_repository::SqliteFeeAdjustmentRepository;
pub use invoice_repository::SqliteInvoiceRepository;
pub use member_repository::SqliteMemberRepository;
pub use payment_repository::SqlitePaymentRepository;

#[async_trait]
pub trait ClubRepository: Send + Sync {
    async fn create(&self, request: CreateClubRequest) -> Result<Club>;
    /// Club, first admin and level fee table in one transaction.
    async fn bootstrap(&self, request: BootstrapClubRequest) -> Result<(Club, User)>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Club>>;
    async fn create_user(&self, request: CreateUserRequest) -> Result<User>;
    async fn find_user(&self, club_id: Uuid, id: Uuid) -> Result<Option<User>>;
    async fn set_level_fee(&self, club_id: Uuid, level: &str, monthly_fee_cents: i64)
        -> Result<LevelFee>;
    async fn find_level_fee(&self, club_id: Uuid, level: &str) -> Result<Option<LevelFee>>;
    async fn list_level_fees(&self, club_id: Uuid) -> Result<Vec<LevelFee>>;
}

#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn create(&self, club_id: Uuid, request: CreateMemberRequest) -> Result<Member>;
    async fn find_by_id(&self, club_id: Uuid, id: Uuid) -> Result<Option<Member>>;
    async fn list(&self, club_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Member>>;
    async fn list_active_by_guardian(&self, club_id: Uuid, guardian_id: Uuid)
        -> Result<Vec<Member>>;
    /// Distinct guardians with at least one active member, i.e. the
    /// payers a club-wide invoice run iterates.
    async fn list_billable_guardians(&self, club_id: Uuid) -> Result<Vec<Uuid>>;
    async fn update(&self, club_id: Uuid, id: Uuid, update: UpdateMemberRequest)
        -> Result<Member>;
    async fn count_by_status(&self, club_id: Uuid) -> Result<Vec<(MemberStatus, i64)>>;
}

#[async_trait]
pub trait FeeAdjustmentRepository: Send + Sync {
    async fn create(&self, club_id: Uuid, request: CreateFeeAdjustmentRequest)
        -> Result<FeeAdjustment>;
    async fn find_by_id(&self, club_id: Uuid, id: Uuid) -> Result<Option<FeeAdjustment>>;
    async fn list_for_member(&self, member_id: Uuid) -> Result<Vec<FeeAdjustment>>;
    async fn deactivate(&self, club_id: Uuid, id: Uuid) -> Result<FeeAdjustment>;
}

/// Aggregate rollup for the admin stats endpoint. Single authoritative
/// implementation; see DESIGN.md.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InvoicePeriodTotals {
    pub invoice_count: i64,
    pub invoiced_cents: i64,
    pub paid_cents: i64,
    pub outstanding_cents: i64,
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Inserts the invoice and all of its items in one transaction. A
    /// (club, payer, month, year) unique violation maps to Conflict.
    async fn create_with_items(&self, invoice: Invoice, items: Vec<InvoiceItem>)
        -> Result<Invoice>;
    async fn find_by_id(&self, club_id: Uuid, id: Uuid) -> Result<Option<Invoice>>;
    async fn find_by_period(&self, club_id: Uuid, payer_id: Uuid, month: u32, year: i32)
        -> Result<Option<Invoice>>;
    async fn list(&self, club_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Invoice>>;
    async fn list_for_payer(&self, club_id: Uuid, payer_id: Uuid) -> Result<Vec<Invoice>>;
    async fn list_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>>;
    async fn add_item(&self, item: InvoiceItem) -> Result<InvoiceItem>;
    async fn delete_item(&self, invoice_id: Uuid, item_id: Uuid) -> Result<()>;
    async fn update_totals(&self, id: Uuid, subtotal_cents: i64, discount_cents: i64,
        total_cents: i64) -> Result<Invoice>;
    async fn mark_paid(&self, id: Uuid, paid_at: DateTime<Utc>, paid_amount_cents: i64)
        -> Result<Invoice>;
    async fn set_status(&self, id: Uuid, status: InvoiceStatus) -> Result<Invoice>;
    /// Invoices already numbered for this (club, year, month); used to
    /// assign the next sequence number.
    async fn count_for_period(&self, club_id: Uuid, year: i32, month: u32) -> Result<i64>;
    async fn totals_for_period(&self, club_id: Uuid, month: u32, year: i32)
        -> Result<InvoicePeriodTotals>;
    async fn list_overdue(&self, club_id: Uuid, as_of: NaiveDate) -> Result<Vec<Invoice>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, club_id: Uuid, id: Uuid) -> Result<Option<Payment>>;
    /// Lookup by the full correlation triple a gateway notification
    /// carries. All three must match for the notification to apply.
    async fn find_for_reconciliation(&self, id: Uuid, club_id: Uuid, invoice_id: Uuid)
        -> Result<Option<Payment>>;
    async fn list_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<Payment>>;
    async fn update_reconciled(&self, id: Uuid, status: PaymentStatus,
        gateway_tx_id: Option<String>, processed_at: DateTime<Utc>,
        metadata: serde_json::Value) -> Result<Payment>;
    async fn append_activity(&self, activity: PaymentActivity) -> Result<PaymentActivity>;
    async fn list_activities(&self, payment_id: Uuid) -> Result<Vec<PaymentActivity>>;
    async fn count_by_status(&self, club_id: Uuid) -> Result<Vec<(PaymentStatus, i64)>>;
}
