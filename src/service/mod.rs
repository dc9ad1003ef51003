pub mod fee_service;
pub mod invoice_service;
pub mod payment_service;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::AuthService;
use crate::repository::*;

pub use fee_service::{resolve_fee, FeeService};
pub use invoice_service::InvoiceService;
pub use payment_service::PaymentService;

pub struct ServiceContext {
    pub club_repo: Arc<dyn ClubRepository>,
    pub member_repo: Arc<dyn MemberRepository>,
    pub adjustment_repo: Arc<dyn FeeAdjustmentRepository>,
    pub invoice_repo: Arc<dyn InvoiceRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub fee_service: Arc<FeeService>,
    pub invoice_service: Arc<InvoiceService>,
    pub payment_service: Arc<PaymentService>,
    pub auth_service: Arc<AuthService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        club_repo: Arc<dyn ClubRepository>,
        member_repo: Arc<dyn MemberRepository>,
        adjustment_repo: Arc<dyn FeeAdjustmentRepository>,
        invoice_repo: Arc<dyn InvoiceRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        auth_service: Arc<AuthService>,
        db_pool: SqlitePool,
    ) -> Self {
        let fee_service = Arc::new(FeeService::new(
            club_repo.clone(),
            member_repo.clone(),
            adjustment_repo.clone(),
        ));
        let invoice_service = Arc::new(InvoiceService::new(
            invoice_repo.clone(),
            member_repo.clone(),
            fee_service.clone(),
        ));
        let payment_service = Arc::new(PaymentService::new(
            payment_repo.clone(),
            invoice_repo.clone(),
        ));

        Self {
            club_repo,
            member_repo,
            adjustment_repo,
            invoice_repo,
            payment_repo,
            fee_service,
            invoice_service,
            payment_service,
            auth_service,
            db_pool,
        }
    }
}
