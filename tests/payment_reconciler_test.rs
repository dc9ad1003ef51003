mod common;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use common::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use salto::{
    config::PayFastConfig,
    domain::{
        Invoice, InvoiceStatus, Payment, PaymentActivityKind, PaymentMethod, PaymentStatus,
    },
    error::AppError,
    payments::PayFastClient,
    repository::{InvoiceRepository, PaymentRepository},
    service::ServiceContext,
};

const MERCHANT_ID: &str = "10000100";
const MERCHANT_KEY: &str = "46f0cd694581a";
const PASSPHRASE: &str = "jt7NOE43FZPn";

fn payfast_client() -> PayFastClient {
    PayFastClient::from_config(&PayFastConfig {
        merchant_id: Some(MERCHANT_ID.to_string()),
        merchant_key: Some(MERCHANT_KEY.to_string()),
        passphrase: Some(PASSPHRASE.to_string()),
        validate_with_gateway: false,
        host: "https://sandbox.payfast.co.za".to_string(),
        enabled: true,
    })
    .expect("client configured")
}

/// Computes the ITN signature the way the gateway would: sorted
/// non-empty fields, url-encoded values, passphrase appended, HMAC
/// keyed with the merchant key.
fn sign_fields(fields: &BTreeMap<String, String>) -> String {
    let mut canonical: Vec<String> = fields
        .iter()
        .filter(|(k, v)| k.as_str() != "signature" && !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    canonical.push(format!("passphrase={}", urlencoding::encode(PASSPHRASE)));

    let mut mac = Hmac::<Sha256>::new_from_slice(MERCHANT_KEY.as_bytes()).unwrap();
    mac.update(canonical.join("&").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn itn(payment: &Payment, invoice: &Invoice, status: &str, tx_id: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert("merchant_id".to_string(), MERCHANT_ID.to_string());
    fields.insert("m_payment_id".to_string(), payment.id.to_string());
    fields.insert("pf_payment_id".to_string(), tx_id.to_string());
    fields.insert("custom_str1".to_string(), invoice.id.to_string());
    fields.insert("custom_str2".to_string(), payment.club_id.to_string());
    fields.insert("payment_status".to_string(), status.to_string());
    fields.insert("amount_gross".to_string(), "650.00".to_string());
    let signature = sign_fields(&fields);
    fields.insert("signature".to_string(), signature);
    fields
}

async fn invoiced_payment(
    ctx: &ServiceContext,
) -> anyhow::Result<(Payment, Invoice)> {
    let club = bootstrap_club(ctx).await?;
    let guardian = create_guardian(ctx, club.id).await?;
    create_member(ctx, club.id, guardian.id, "Level 1", None).await?;

    let invoice = ctx
        .invoice_service
        .generate_for_payer(
            club.id,
            guardian.id,
            3,
            2024,
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
        )
        .await?;

    let (payment, invoice) = ctx
        .payment_service
        .initiate(club.id, invoice.id, PaymentMethod::PayFast)
        .await?;

    Ok((payment, invoice))
}

#[tokio::test]
async fn completed_notification_marks_invoice_paid_with_one_activity() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let client = payfast_client();
    let (payment, invoice) = invoiced_payment(&ctx).await?;

    let fields = itn(&payment, &invoice, "COMPLETE", "PF-1089250");
    client.verify_itn(&fields)?;
    let notification = client.parse_notification(&fields)?;

    let updated = ctx.payment_service.reconcile(notification).await?;
    assert_eq!(updated.status, PaymentStatus::Completed);
    assert_eq!(updated.gateway_tx_id.as_deref(), Some("PF-1089250"));
    assert!(updated.processed_at.is_some());

    let invoice = ctx
        .invoice_repo
        .find_by_id(invoice.club_id, invoice.id)
        .await?
        .unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert!(invoice.paid_at.is_some());
    assert_eq!(invoice.paid_amount_cents, Some(65000));

    let activities = ctx.payment_repo.list_activities(payment.id).await?;
    let completed: Vec<_> = activities
        .iter()
        .filter(|a| a.kind == PaymentActivityKind::Completed)
        .collect();
    assert_eq!(completed.len(), 1, "exactly one completion activity");

    Ok(())
}

#[tokio::test]
async fn redelivered_notification_is_not_applied_twice() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let client = payfast_client();
    let (payment, invoice) = invoiced_payment(&ctx).await?;

    let fields = itn(&payment, &invoice, "COMPLETE", "PF-1089250");
    let notification = client.parse_notification(&fields)?;
    ctx.payment_service.reconcile(notification.clone()).await?;

    let before = ctx.payment_repo.list_activities(payment.id).await?.len();

    // The gateway redelivers the identical notification.
    let again = ctx.payment_service.reconcile(notification).await?;
    assert_eq!(again.status, PaymentStatus::Completed);

    let after = ctx.payment_repo.list_activities(payment.id).await?.len();
    assert_eq!(before, after, "replay must not append activity rows");

    Ok(())
}

#[tokio::test]
async fn invalid_signature_changes_nothing() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let client = payfast_client();
    let (payment, invoice) = invoiced_payment(&ctx).await?;

    // Tamper with the amount after signing.
    let mut fields = itn(&payment, &invoice, "COMPLETE", "PF-1089250");
    fields.insert("amount_gross".to_string(), "1.00".to_string());

    let err = client.verify_itn(&fields).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Nothing moved: payment still pending, invoice still unpaid, no
    // new activity beyond the initiation row.
    let payment_after = ctx
        .payment_repo
        .find_by_id(payment.club_id, payment.id)
        .await?
        .unwrap();
    assert_eq!(payment_after.status, PaymentStatus::Pending);
    assert!(payment_after.gateway_tx_id.is_none());

    let invoice_after = ctx
        .invoice_repo
        .find_by_id(invoice.club_id, invoice.id)
        .await?
        .unwrap();
    assert_eq!(invoice_after.status, InvoiceStatus::Pending);
    assert!(invoice_after.paid_at.is_none());

    let activities = ctx.payment_repo.list_activities(payment.id).await?;
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].kind, PaymentActivityKind::Initiated);

    Ok(())
}

#[tokio::test]
async fn failed_notification_leaves_invoice_payable() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let client = payfast_client();
    let (payment, invoice) = invoiced_payment(&ctx).await?;

    let mut fields = itn(&payment, &invoice, "FAILED", "PF-2000001");
    fields.insert("reason".to_string(), "Insufficient funds".to_string());
    let signature = sign_fields(&fields);
    fields.insert("signature".to_string(), signature);

    client.verify_itn(&fields)?;
    let notification = client.parse_notification(&fields)?;
    let updated = ctx.payment_service.reconcile(notification).await?;
    assert_eq!(updated.status, PaymentStatus::Failed);

    // The invoice is untouched and can be paid again.
    let invoice_after = ctx
        .invoice_repo
        .find_by_id(invoice.club_id, invoice.id)
        .await?
        .unwrap();
    assert_eq!(invoice_after.status, InvoiceStatus::Pending);

    let activities = ctx.payment_repo.list_activities(payment.id).await?;
    let failed: Vec<_> = activities
        .iter()
        .filter(|a| a.kind == PaymentActivityKind::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].message.contains("Insufficient funds"));

    // A fresh attempt against the same invoice is allowed.
    ctx.payment_service
        .initiate(invoice.club_id, invoice.id, PaymentMethod::PayFast)
        .await?;

    Ok(())
}

#[tokio::test]
async fn terminal_payment_rejects_contradicting_notification() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let client = payfast_client();
    let (payment, invoice) = invoiced_payment(&ctx).await?;

    let fields = itn(&payment, &invoice, "COMPLETE", "PF-1089250");
    ctx.payment_service
        .reconcile(client.parse_notification(&fields)?)
        .await?;

    // A later FAILED notification for the same payment (different
    // gateway transaction) must not rewind the state.
    let fields = itn(&payment, &invoice, "FAILED", "PF-9999999");
    let err = ctx
        .payment_service
        .reconcile(client.parse_notification(&fields)?)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let payment_after = ctx
        .payment_repo
        .find_by_id(payment.club_id, payment.id)
        .await?
        .unwrap();
    assert_eq!(payment_after.status, PaymentStatus::Completed);

    Ok(())
}

#[tokio::test]
async fn unknown_gateway_status_stays_pending() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let client = payfast_client();
    let (payment, invoice) = invoiced_payment(&ctx).await?;

    let fields = itn(&payment, &invoice, "UNDER_REVIEW", "PF-3000001");
    let notification = client.parse_notification(&fields)?;
    assert_eq!(notification.status, PaymentStatus::Pending);

    let updated = ctx.payment_service.reconcile(notification).await?;
    assert_eq!(updated.status, PaymentStatus::Pending);

    // No activity recorded for a non-event.
    let activities = ctx.payment_repo.list_activities(payment.id).await?;
    assert_eq!(activities.len(), 1);

    let invoice_after = ctx
        .invoice_repo
        .find_by_id(invoice.club_id, invoice.id)
        .await?
        .unwrap();
    assert_eq!(invoice_after.status, InvoiceStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn notification_for_unknown_payment_is_not_found() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let client = payfast_client();
    let (payment, invoice) = invoiced_payment(&ctx).await?;

    // Correlation triple pointing at a payment we never issued.
    let mut ghost = payment.clone();
    ghost.id = Uuid::new_v4();
    let fields = itn(&ghost, &invoice, "COMPLETE", "PF-4000001");

    let err = ctx
        .payment_service
        .reconcile(client.parse_notification(&fields)?)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}

#[tokio::test]
async fn manual_payment_settles_invoice() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    create_member(&ctx, club.id, guardian.id, "Level 1", None).await?;

    let invoice = ctx
        .invoice_service
        .generate_for_payer(
            club.id,
            guardian.id,
            3,
            2024,
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
        )
        .await?;

    let payment = ctx
        .payment_service
        .record_manual_payment(
            club.id,
            invoice.id,
            invoice.total_cents,
            PaymentMethod::Eft,
            Some("EFT-REF-001".to_string()),
        )
        .await?;

    assert_eq!(payment.status, PaymentStatus::Completed);

    let invoice_after = ctx
        .invoice_repo
        .find_by_id(club.id, invoice.id)
        .await?
        .unwrap();
    assert_eq!(invoice_after.status, InvoiceStatus::Paid);

    // Settling twice is a conflict.
    let err = ctx
        .payment_service
        .record_manual_payment(club.id, invoice.id, 100, PaymentMethod::Eft, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}
