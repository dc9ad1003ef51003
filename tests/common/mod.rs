use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use salto::{
    auth::AuthService,
    domain::{
        BootstrapClubRequest, Club, CreateMemberRequest, CreateUserRequest, LevelFeeSpec, Member,
        User, UserRole,
    },
    repository::{
        ClubRepository, MemberRepository, SqliteClubRepository, SqliteFeeAdjustmentRepository,
        SqliteInvoiceRepository, SqliteMemberRepository, SqlitePaymentRepository,
    },
    service::ServiceContext,
};

pub async fn setup_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePool::connect(":memory:").await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub fn service_context(pool: SqlitePool) -> Arc<ServiceContext> {
    let club_repo = Arc::new(SqliteClubRepository::new(pool.clone()));
    let member_repo = Arc::new(SqliteMemberRepository::new(pool.clone()));
    let adjustment_repo = Arc::new(SqliteFeeAdjustmentRepository::new(pool.clone()));
    let invoice_repo = Arc::new(SqliteInvoiceRepository::new(pool.clone()));
    let payment_repo = Arc::new(SqlitePaymentRepository::new(pool.clone()));
    let auth_service = Arc::new(AuthService::new(pool.clone()));

    Arc::new(ServiceContext::new(
        club_repo,
        member_repo,
        adjustment_repo,
        invoice_repo,
        payment_repo,
        auth_service,
        pool,
    ))
}

/// A club with the standard level fee table (Level 1 at R650).
pub async fn bootstrap_club(ctx: &ServiceContext) -> anyhow::Result<Club> {
    let (club, _admin) = ctx
        .club_repo
        .bootstrap(BootstrapClubRequest {
            name: "Testville Gymnastics".to_string(),
            currency: Some("ZAR".to_string()),
            contact_email: None,
            admin_email: "admin@testville.example".to_string(),
            admin_name: "Test Admin".to_string(),
            level_fees: vec![
                LevelFeeSpec {
                    level: "Level 1".to_string(),
                    monthly_fee_cents: 65000,
                },
                LevelFeeSpec {
                    level: "Level 2".to_string(),
                    monthly_fee_cents: 72000,
                },
            ],
        })
        .await?;
    Ok(club)
}

pub async fn create_guardian(ctx: &ServiceContext, club_id: Uuid) -> anyhow::Result<User> {
    let guardian = ctx
        .club_repo
        .create_user(CreateUserRequest {
            club_id,
            email: format!("{}@example.com", Uuid::new_v4()),
            full_name: "Pat Guardian".to_string(),
            role: UserRole::Parent,
            phone: None,
        })
        .await?;
    Ok(guardian)
}

pub async fn create_member(
    ctx: &ServiceContext,
    club_id: Uuid,
    guardian_id: Uuid,
    level: &str,
    monthly_fee_cents: Option<i64>,
) -> anyhow::Result<Member> {
    let member = ctx
        .member_repo
        .create(
            club_id,
            CreateMemberRequest {
                guardian_id,
                first_name: "Jamie".to_string(),
                last_name: "Tumbler".to_string(),
                level: level.to_string(),
                monthly_fee_cents,
            },
        )
        .await?;
    Ok(member)
}
