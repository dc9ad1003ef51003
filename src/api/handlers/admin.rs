use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{handlers::ApiResponse, state::AppState},
    auth::AuthContext,
    domain::{CreateUserRequest, Invoice, LevelFee, MemberStatus, PaymentStatus, User, UserRole},
    error::{AppError, Result},
    repository::{
        ClubRepository, InvoicePeriodTotals, InvoiceRepository, MemberRepository,
        PaymentRepository,
    },
};

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    month: Option<u32>,
    year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ClubStats {
    pub month: u32,
    pub year: i32,
    pub members: Vec<StatusCount<MemberStatus>>,
    pub invoices: InvoicePeriodTotals,
    pub payments: Vec<StatusCount<PaymentStatus>>,
}

#[derive(Debug, Serialize)]
pub struct StatusCount<S> {
    pub status: S,
    pub count: i64,
}

/// Single authoritative rollup for the club dashboard: member and
/// payment counts by status plus invoiced/paid/outstanding totals for
/// one period (defaulting to the current month).
pub async fn stats(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<StatsParams>,
) -> Result<Json<ApiResponse<ClubStats>>> {
    let now = Utc::now();
    let month = params.month.unwrap_or_else(|| now.month());
    let year = params.year.unwrap_or_else(|| now.year());

    if !(1..=12).contains(&month) {
        return Err(AppError::Validation(format!("Invalid month: {}", month)));
    }

    let members = state
        .service_context
        .member_repo
        .count_by_status(ctx.club_id)
        .await?
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();

    let invoices = state
        .service_context
        .invoice_repo
        .totals_for_period(ctx.club_id, month, year)
        .await?;

    let payments = state
        .service_context
        .payment_repo
        .count_by_status(ctx.club_id)
        .await?
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();

    Ok(ApiResponse::ok(ClubStats {
        month,
        year,
        members,
        invoices,
        payments,
    }))
}

/// Flags pending invoices past their due date as overdue.
pub async fn mark_overdue(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Vec<Invoice>>>> {
    let updated = state
        .service_context
        .invoice_service
        .mark_overdue(ctx.club_id, Utc::now().date_naive())
        .await?;

    Ok(ApiResponse::with_message(
        updated,
        "Overdue sweep complete",
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetLevelFeeDto {
    #[validate(length(min = 1, max = 50))]
    pub level: String,
    #[validate(range(min = 0))]
    pub monthly_fee_cents: i64,
}

pub async fn set_level_fee(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(dto): Json<SetLevelFeeDto>,
) -> Result<Json<ApiResponse<LevelFee>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let fee = state
        .service_context
        .club_repo
        .set_level_fee(ctx.club_id, &dto.level, dto.monthly_fee_cents)
        .await?;

    Ok(ApiResponse::ok(fee))
}

pub async fn list_level_fees(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Vec<LevelFee>>>> {
    let fees = state
        .service_context
        .club_repo
        .list_level_fees(ctx.club_id)
        .await?;

    Ok(ApiResponse::ok(fees))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserDto {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    pub role: UserRole,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
        }
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(dto): Json<CreateUserDto>,
) -> Result<(StatusCode, Json<ApiResponse<UserDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = state
        .service_context
        .club_repo
        .create_user(CreateUserRequest {
            club_id: ctx.club_id,
            email: dto.email,
            full_name: dto.full_name,
            role: dto.role,
            phone: dto.phone,
        })
        .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(user.into())))
}
