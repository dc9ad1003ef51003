use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{handlers::ApiResponse, state::AppState},
    auth::AuthContext,
    domain::{CreateMemberRequest, Member, MemberStatus, UpdateMemberRequest},
    error::{AppError, Result},
    repository::{ClubRepository, MemberRepository},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct MemberDto {
    id: Uuid,
    guardian_id: Uuid,
    first_name: String,
    last_name: String,
    level: String,
    monthly_fee_cents: Option<i64>,
    status: MemberStatus,
    created_at: String,
}

impl From<Member> for MemberDto {
    fn from(member: Member) -> Self {
        Self {
            id: member.id,
            guardian_id: member.guardian_id,
            first_name: member.first_name,
            last_name: member.last_name,
            level: member.level,
            monthly_fee_cents: member.monthly_fee_cents,
            status: member.status,
            created_at: member.created_at.to_rfc3339(),
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<MemberDto>>>> {
    let members = state
        .service_context
        .member_repo
        .list(ctx.club_id, params.limit, params.offset)
        .await?;

    Ok(ApiResponse::ok(members.into_iter().map(Into::into).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MemberDto>>> {
    let member = state
        .service_context
        .member_repo
        .find_by_id(ctx.club_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

    Ok(ApiResponse::ok(member.into()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMemberDto {
    pub guardian_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(min = 1, max = 50))]
    pub level: String,
    #[validate(range(min = 0))]
    pub monthly_fee_cents: Option<i64>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(dto): Json<CreateMemberDto>,
) -> Result<(StatusCode, Json<ApiResponse<MemberDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    // The payer must exist in the same club before a child can be
    // attached to them.
    state
        .service_context
        .club_repo
        .find_user(ctx.club_id, dto.guardian_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Guardian not found".to_string()))?;

    let member = state
        .service_context
        .member_repo
        .create(
            ctx.club_id,
            CreateMemberRequest {
                guardian_id: dto.guardian_id,
                first_name: dto.first_name,
                last_name: dto.last_name,
                level: dto.level,
                monthly_fee_cents: dto.monthly_fee_cents,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(member.into())))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateMemberRequest>,
) -> Result<Json<ApiResponse<MemberDto>>> {
    let member = state
        .service_context
        .member_repo
        .update(ctx.club_id, id, update)
        .await?;

    Ok(ApiResponse::ok(member.into()))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MemberDto>>> {
    let member = state
        .service_context
        .member_repo
        .update(
            ctx.club_id,
            id,
            UpdateMemberRequest {
                status: Some(MemberStatus::Withdrawn),
                ..Default::default()
            },
        )
        .await?;

    Ok(ApiResponse::ok(member.into()))
}
