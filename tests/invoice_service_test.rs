mod common;

use chrono::NaiveDate;
use common::*;
use salto::{
    domain::{
        AdjustmentKind, CreateFeeAdjustmentRequest, InvoiceItemType, InvoiceStatus, NewInvoiceItem,
    },
    error::AppError,
    repository::{FeeAdjustmentRepository, InvoiceRepository},
};

fn due(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 7).unwrap()
}

#[tokio::test]
async fn generates_one_invoice_per_payer_with_resolved_fees() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    create_member(&ctx, club.id, guardian.id, "Level 1", None).await?;
    create_member(&ctx, club.id, guardian.id, "Level 2", Some(60000)).await?;

    let invoice = ctx
        .invoice_service
        .generate_for_payer(club.id, guardian.id, 3, 2024, due(2024, 3))
        .await?;

    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.subtotal_cents, 65000 + 60000);
    assert_eq!(invoice.discount_cents, 0);
    assert_eq!(invoice.total_cents, invoice.subtotal_cents);
    assert_eq!(invoice.invoice_number, "INV-202403-0001");

    let items = ctx.invoice_repo.list_items(invoice.id).await?;
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.item_type == InvoiceItemType::MonthlyFee));

    Ok(())
}

#[tokio::test]
async fn second_generation_for_same_period_conflicts() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    create_member(&ctx, club.id, guardian.id, "Level 1", None).await?;

    ctx.invoice_service
        .generate_for_payer(club.id, guardian.id, 3, 2024, due(2024, 3))
        .await?;

    let err = ctx
        .invoice_service
        .generate_for_payer(club.id, guardian.id, 3, 2024, due(2024, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Still exactly one invoice for the period.
    let invoices = ctx.invoice_repo.list(club.id, 50, 0).await?;
    assert_eq!(invoices.len(), 1);

    // A different month is fine.
    ctx.invoice_service
        .generate_for_payer(club.id, guardian.id, 4, 2024, due(2024, 4))
        .await?;

    Ok(())
}

#[tokio::test]
async fn zero_fee_members_are_skipped_and_empty_invoices_rejected() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    let waived = create_member(&ctx, club.id, guardian.id, "Level 1", None).await?;
    create_member(&ctx, club.id, guardian.id, "Level 2", None).await?;

    // Waive the first member for the whole of 2024.
    ctx.adjustment_repo
        .create(
            club.id,
            CreateFeeAdjustmentRequest {
                member_id: waived.id,
                kind: AdjustmentKind::Temporary,
                adjusted_fee_cents: 0,
                effective_month: 1,
                effective_year: 2024,
                expiry_month: Some(12),
                expiry_year: Some(2024),
                reason: "Waived".to_string(),
            },
        )
        .await?;

    let invoice = ctx
        .invoice_service
        .generate_for_payer(club.id, guardian.id, 5, 2024, due(2024, 5))
        .await?;

    let items = ctx.invoice_repo.list_items(invoice.id).await?;
    assert_eq!(items.len(), 1, "waived member must not appear");
    assert_eq!(invoice.total_cents, 72000);

    // A payer whose only member is waived has nothing to invoice.
    let lone = create_guardian(&ctx, club.id).await?;
    let lone_member = create_member(&ctx, club.id, lone.id, "Level 1", None).await?;
    ctx.adjustment_repo
        .create(
            club.id,
            CreateFeeAdjustmentRequest {
                member_id: lone_member.id,
                kind: AdjustmentKind::Temporary,
                adjusted_fee_cents: 0,
                effective_month: 1,
                effective_year: 2024,
                expiry_month: Some(12),
                expiry_year: Some(2024),
                reason: "Waived".to_string(),
            },
        )
        .await?;

    let err = ctx
        .invoice_service
        .generate_for_payer(club.id, lone.id, 5, 2024, due(2024, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

#[tokio::test]
async fn club_wide_run_collects_per_payer_results() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;

    let first = create_guardian(&ctx, club.id).await?;
    create_member(&ctx, club.id, first.id, "Level 1", None).await?;
    let second = create_guardian(&ctx, club.id).await?;
    create_member(&ctx, club.id, second.id, "Level 2", None).await?;

    // Pre-invoice the first payer so the batch hits a duplicate.
    ctx.invoice_service
        .generate_for_payer(club.id, first.id, 6, 2024, due(2024, 6))
        .await?;

    let results = ctx
        .invoice_service
        .generate_for_club(club.id, 6, 2024, due(2024, 6))
        .await?;

    assert_eq!(results.len(), 2);
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
    let succeeded: Vec<_> = results.iter().filter(|r| r.invoice_id.is_some()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].payer_id, first.id);
    assert_eq!(succeeded.len(), 1);
    assert_eq!(succeeded[0].payer_id, second.id);

    Ok(())
}

#[tokio::test]
async fn totals_track_item_and_discount_mutations() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    create_member(&ctx, club.id, guardian.id, "Level 1", None).await?;

    let invoice = ctx
        .invoice_service
        .generate_for_payer(club.id, guardian.id, 3, 2024, due(2024, 3))
        .await?;
    assert_eq!(invoice.total_cents, 65000);

    // Add a once-off competition entry.
    let invoice = ctx
        .invoice_service
        .add_item(
            club.id,
            invoice.id,
            NewInvoiceItem {
                member_id: None,
                description: "Regional competition entry".to_string(),
                item_type: InvoiceItemType::OnceOff,
                unit_amount_cents: 15000,
                quantity: 1,
            },
        )
        .await?;
    assert_eq!(invoice.subtotal_cents, 80000);
    assert_eq!(invoice.total_cents, 80000);

    // Apply a discount; the invariant total = subtotal - discount holds.
    let invoice = ctx
        .invoice_service
        .set_discount(club.id, invoice.id, 10000)
        .await?;
    assert_eq!(invoice.subtotal_cents, 80000);
    assert_eq!(invoice.discount_cents, 10000);
    assert_eq!(invoice.total_cents, 70000);

    // Remove the once-off item; totals recompute again.
    let items = ctx.invoice_repo.list_items(invoice.id).await?;
    let once_off = items
        .iter()
        .find(|i| i.item_type == InvoiceItemType::OnceOff)
        .unwrap();
    let invoice = ctx
        .invoice_service
        .remove_item(club.id, invoice.id, once_off.id)
        .await?;
    assert_eq!(invoice.subtotal_cents, 65000);
    assert_eq!(invoice.total_cents, 55000);

    Ok(())
}

#[tokio::test]
async fn paid_invoices_reject_item_edits() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    create_member(&ctx, club.id, guardian.id, "Level 1", None).await?;

    let invoice = ctx
        .invoice_service
        .generate_for_payer(club.id, guardian.id, 3, 2024, due(2024, 3))
        .await?;

    ctx.invoice_repo
        .mark_paid(invoice.id, chrono::Utc::now(), invoice.total_cents)
        .await?;

    let err = ctx
        .invoice_service
        .add_item(
            club.id,
            invoice.id,
            NewInvoiceItem {
                member_id: None,
                description: "Late addition".to_string(),
                item_type: InvoiceItemType::Other,
                unit_amount_cents: 5000,
                quantity: 1,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = ctx
        .invoice_service
        .set_discount(club.id, invoice.id, 1000)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn overdue_sweep_flags_past_due_pending_invoices() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    create_member(&ctx, club.id, guardian.id, "Level 1", None).await?;

    let invoice = ctx
        .invoice_service
        .generate_for_payer(club.id, guardian.id, 3, 2024, due(2024, 3))
        .await?;

    let swept = ctx
        .invoice_service
        .mark_overdue(club.id, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())
        .await?;

    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].id, invoice.id);
    assert_eq!(swept[0].status, InvoiceStatus::Overdue);

    Ok(())
}
