use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{handlers::ApiResponse, state::AppState},
    auth::AuthContext,
    domain::{AdjustmentKind, CreateFeeAdjustmentRequest, FeeAdjustment, ResolvedFee},
    error::{AppError, Result},
    repository::{FeeAdjustmentRepository, MemberRepository},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAdjustmentDto {
    pub member_id: Uuid,
    pub kind: AdjustmentKind,
    #[validate(range(min = 0))]
    pub adjusted_fee_cents: i64,
    #[validate(range(min = 1, max = 12))]
    pub effective_month: u32,
    #[validate(range(min = 2000, max = 2100))]
    pub effective_year: i32,
    #[validate(range(min = 1, max = 12))]
    pub expiry_month: Option<u32>,
    #[validate(range(min = 2000, max = 2100))]
    pub expiry_year: Option<i32>,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(dto): Json<CreateAdjustmentDto>,
) -> Result<(StatusCode, Json<ApiResponse<FeeAdjustment>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if dto.kind == AdjustmentKind::Temporary
        && (dto.expiry_month.is_none() || dto.expiry_year.is_none())
    {
        return Err(AppError::Validation(
            "Temporary adjustments require an expiry month and year".to_string(),
        ));
    }

    let member = state
        .service_context
        .member_repo
        .find_by_id(ctx.club_id, dto.member_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

    let adjustment = state
        .service_context
        .adjustment_repo
        .create(
            ctx.club_id,
            CreateFeeAdjustmentRequest {
                member_id: member.id,
                kind: dto.kind,
                adjusted_fee_cents: dto.adjusted_fee_cents,
                effective_month: dto.effective_month,
                effective_year: dto.effective_year,
                expiry_month: dto.expiry_month,
                expiry_year: dto.expiry_year,
                reason: dto.reason,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(adjustment)))
}

pub async fn list_for_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<FeeAdjustment>>>> {
    // Scope check before listing: the member must belong to the
    // caller's club.
    state
        .service_context
        .member_repo
        .find_by_id(ctx.club_id, member_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

    let adjustments = state
        .service_context
        .adjustment_repo
        .list_for_member(member_id)
        .await?;

    Ok(ApiResponse::ok(adjustments))
}

pub async fn deactivate(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FeeAdjustment>>> {
    let adjustment = state
        .service_context
        .adjustment_repo
        .deactivate(ctx.club_id, id)
        .await?;

    Ok(ApiResponse::ok(adjustment))
}

#[derive(Debug, Deserialize)]
pub struct EffectiveFeeParams {
    month: Option<u32>,
    year: Option<i32>,
}

/// The "what would this member be charged" query: same resolver the
/// invoice run uses, defaulting to the current period.
pub async fn effective_fee(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(member_id): Path<Uuid>,
    Query(params): Query<EffectiveFeeParams>,
) -> Result<Json<ApiResponse<ResolvedFee>>> {
    let fee = match (params.month, params.year) {
        (Some(month), Some(year)) => {
            if !(1..=12).contains(&month) {
                return Err(AppError::Validation(format!("Invalid month: {}", month)));
            }
            state
                .service_context
                .fee_service
                .effective_fee(ctx.club_id, member_id, month, year)
                .await?
        }
        (None, None) => {
            state
                .service_context
                .fee_service
                .current_fee(ctx.club_id, member_id)
                .await?
        }
        _ => {
            return Err(AppError::Validation(
                "month and year must be supplied together".to_string(),
            ))
        }
    };

    Ok(ApiResponse::ok(fee))
}
