use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{handlers::ApiResponse, state::AppState},
    auth::AuthContext,
    domain::{Invoice, InvoiceItem, NewInvoiceItem, PayerInvoiceResult},
    error::Result,
    repository::InvoiceRepository,
};

#[derive(Debug, Deserialize)]
pub struct GeneratePayerDto {
    pub payer_id: Uuid,
    pub month: u32,
    pub year: i32,
    pub due_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct GenerateClubDto {
    pub month: u32,
    pub year: i32,
    pub due_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct InvoiceWithItems {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

pub async fn generate_for_payer(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(dto): Json<GeneratePayerDto>,
) -> Result<(StatusCode, Json<ApiResponse<Invoice>>)> {
    let invoice = state
        .service_context
        .invoice_service
        .generate_for_payer(ctx.club_id, dto.payer_id, dto.month, dto.year, dto.due_date)
        .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(invoice)))
}

pub async fn generate_for_club(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(dto): Json<GenerateClubDto>,
) -> Result<Json<ApiResponse<Vec<PayerInvoiceResult>>>> {
    let results = state
        .service_context
        .invoice_service
        .generate_for_club(ctx.club_id, dto.month, dto.year, dto.due_date)
        .await?;

    let failures = results.iter().filter(|r| r.error.is_some()).count();
    Ok(ApiResponse::with_message(
        results,
        format!("{} payer(s) failed", failures),
    ))
}

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

pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<Invoice>>>> {
    let invoices = state
        .service_context
        .invoice_repo
        .list(ctx.club_id, params.limit, params.offset)
        .await?;

    Ok(ApiResponse::ok(invoices))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<InvoiceWithItems>>> {
    let (invoice, items) = state
        .service_context
        .invoice_service
        .get_with_items(ctx.club_id, id)
        .await?;

    Ok(ApiResponse::ok(InvoiceWithItems { invoice, items }))
}

pub async fn add_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(item): Json<NewInvoiceItem>,
) -> Result<Json<ApiResponse<Invoice>>> {
    let invoice = state
        .service_context
        .invoice_service
        .add_item(ctx.club_id, id, item)
        .await?;

    Ok(ApiResponse::ok(invoice))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<Invoice>>> {
    let invoice = state
        .service_context
        .invoice_service
        .remove_item(ctx.club_id, id, item_id)
        .await?;

    Ok(ApiResponse::ok(invoice))
}

#[derive(Debug, Deserialize)]
pub struct DiscountDto {
    pub discount_cents: i64,
}

pub async fn set_discount(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(dto): Json<DiscountDto>,
) -> Result<Json<ApiResponse<Invoice>>> {
    let invoice = state
        .service_context
        .invoice_service
        .set_discount(ctx.club_id, id, dto.discount_cents)
        .await?;

    Ok(ApiResponse::ok(invoice))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Invoice>>> {
    let invoice = state
        .service_context
        .invoice_service
        .cancel(ctx.club_id, id)
        .await?;

    Ok(ApiResponse::ok(invoice))
}
