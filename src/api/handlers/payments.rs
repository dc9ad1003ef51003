use std::collections::BTreeMap;

use axum::{
    extract::{Extension, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{handlers::ApiResponse, state::AppState},
    auth::AuthContext,
    domain::{Payment, PaymentActivity, PaymentMethod},
    error::{AppError, Result},
    repository::{ClubRepository, InvoiceRepository, PaymentRepository},
};

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentDto {
    pub invoice_id: Uuid,
    pub method: PaymentMethod,
}

#[derive(Debug, Serialize)]
pub struct InitiatedPayment {
    pub payment_id: Uuid,
    pub redirect_url: String,
}

/// Creates a pending payment for an invoice and returns the gateway
/// URL the buyer should be sent to. The payment id and invoice id ride
/// along to the gateway and come back in its notification.
pub async fn initiate(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(dto): Json<InitiatePaymentDto>,
) -> Result<(StatusCode, Json<ApiResponse<InitiatedPayment>>)> {
    let (payment, invoice) = state
        .service_context
        .payment_service
        .initiate(ctx.club_id, dto.invoice_id, dto.method)
        .await?;

    let base_url = &state.settings.server.base_url;

    let redirect_url = match dto.method {
        PaymentMethod::PayFast => {
            let client = state
                .payfast_client
                .as_ref()
                .ok_or_else(|| AppError::BadRequest("PayFast is not enabled".to_string()))?;

            let payer = state
                .service_context
                .club_repo
                .find_user(ctx.club_id, invoice.payer_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Payer not found".to_string()))?;

            client.build_redirect_url(
                &payment,
                &invoice,
                &payer,
                &format!("{}/payments/return", base_url),
                &format!("{}/payments/cancelled", base_url),
                &format!("{}/api/payments/webhook/payfast", base_url),
            )?
        }
        PaymentMethod::Yoco => {
            let client = state
                .yoco_client
                .as_ref()
                .ok_or_else(|| AppError::BadRequest("Yoco is not enabled".to_string()))?;

            client
                .create_checkout(
                    &payment,
                    &invoice,
                    &format!("{}/payments/return", base_url),
                    &format!("{}/payments/cancelled", base_url),
                    &format!("{}/payments/failed", base_url),
                )
                .await?
        }
        PaymentMethod::Eft | PaymentMethod::Manual => {
            return Err(AppError::BadRequest(
                "Offline methods are recorded via the manual payment endpoint".to_string(),
            ))
        }
    };

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(InitiatedPayment {
            payment_id: payment.id,
            redirect_url,
        }),
    ))
}

/// PayFast ITN endpoint. The gateway expects the literal `OK` once the
/// notification is accepted; authentication failures are 4xx so the
/// gateway stops, while internal failures stay 5xx so it redelivers.
pub async fn payfast_webhook(State(state): State<AppState>, body: String) -> Result<String> {
    let client = state
        .payfast_client
        .as_ref()
        .ok_or_else(|| AppError::Internal("PayFast is not configured".to_string()))?;

    let fields: BTreeMap<String, String> = serde_urlencoded::from_str(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid notification body: {}", e)))?;

    client.verify_itn(&fields)?;
    client.confirm_with_gateway(&body).await?;

    let notification = client.parse_notification(&fields)?;

    tracing::info!(
        payment_id = %notification.payment_id,
        status = %notification.raw_status,
        "PayFast notification received"
    );

    state
        .service_context
        .payment_service
        .reconcile(notification)
        .await?;

    Ok("OK".to_string())
}

/// Yoco webhook endpoint. Signature headers cover the raw body, so the
/// body must be taken verbatim before any JSON parsing.
pub async fn yoco_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode> {
    let client = state
        .yoco_client
        .as_ref()
        .ok_or_else(|| AppError::Internal("Yoco is not configured".to_string()))?;

    let webhook_id = required_header(&headers, "webhook-id")?;
    let webhook_timestamp = required_header(&headers, "webhook-timestamp")?;
    let signature = required_header(&headers, "webhook-signature")?;

    client.verify_webhook(webhook_id, webhook_timestamp, signature, &body)?;

    let notification = client.parse_webhook(&body)?;

    tracing::info!(
        payment_id = %notification.payment_id,
        event = %notification.raw_status,
        "Yoco webhook received"
    );

    state
        .service_context
        .payment_service
        .reconcile(notification)
        .await?;

    Ok(StatusCode::OK)
}

pub async fn list_for_invoice(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Payment>>>> {
    // Scope check: the invoice must belong to the caller's club.
    state
        .service_context
        .invoice_repo
        .find_by_id(ctx.club_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))?;

    let payments = state
        .service_context
        .payment_repo
        .list_for_invoice(invoice_id)
        .await?;

    Ok(ApiResponse::ok(payments))
}

pub async fn activities(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<PaymentActivity>>>> {
    state
        .service_context
        .payment_repo
        .find_by_id(ctx.club_id, payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    let activities = state
        .service_context
        .payment_repo
        .list_activities(payment_id)
        .await?;

    Ok(ApiResponse::ok(activities))
}

#[derive(Debug, Deserialize)]
pub struct ManualPaymentDto {
    pub invoice_id: Uuid,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

pub async fn record_manual(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(dto): Json<ManualPaymentDto>,
) -> Result<(StatusCode, Json<ApiResponse<Payment>>)> {
    if dto.amount_cents <= 0 {
        return Err(AppError::Validation("Amount must be positive".to_string()));
    }
    if !matches!(dto.method, PaymentMethod::Eft | PaymentMethod::Manual) {
        return Err(AppError::BadRequest(
            "Gateway payments cannot be recorded manually".to_string(),
        ));
    }

    let payment = state
        .service_context
        .payment_service
        .record_manual_payment(
            ctx.club_id,
            dto.invoice_id,
            dto.amount_cents,
            dto.method,
            dto.reference,
        )
        .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(payment)))
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest(format!("Missing header: {}", name)))
}
