mod common;

use common::*;
use salto::{
    domain::{AdjustmentKind, CreateFeeAdjustmentRequest, FeeBasis},
    repository::FeeAdjustmentRepository,
    service::resolve_fee,
};

#[test]
fn no_adjustments_uses_override_then_default_then_zero() {
    let with_override = resolve_fee(Some(50000), Some(65000), &[], 3, 2024);
    assert_eq!(with_override.amount_cents, 50000);
    assert_eq!(with_override.basis, FeeBasis::MemberOverride);

    let with_default = resolve_fee(None, Some(65000), &[], 3, 2024);
    assert_eq!(with_default.amount_cents, 65000);
    assert_eq!(with_default.basis, FeeBasis::LevelDefault);

    let unpriced = resolve_fee(None, None, &[], 3, 2024);
    assert_eq!(unpriced.amount_cents, 0);
    assert_eq!(unpriced.basis, FeeBasis::Unpriced);
}

#[tokio::test]
async fn level_default_applies_for_any_month() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    let member = create_member(&ctx, club.id, guardian.id, "Level 1", None).await?;

    for (month, year) in [(1, 2024), (7, 2024), (12, 2025)] {
        let fee = ctx
            .fee_service
            .effective_fee(club.id, member.id, month, year)
            .await?;
        assert_eq!(fee.amount_cents, 65000);
        assert_eq!(fee.basis, FeeBasis::LevelDefault);
        assert!(!fee.degraded);
    }

    Ok(())
}

#[tokio::test]
async fn permanent_adjustment_not_yet_effective_is_ignored() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    let member = create_member(&ctx, club.id, guardian.id, "Level 1", None).await?;

    ctx.adjustment_repo
        .create(
            club.id,
            CreateFeeAdjustmentRequest {
                member_id: member.id,
                kind: AdjustmentKind::Permanent,
                adjusted_fee_cents: 40000,
                effective_month: 3,
                effective_year: 2024,
                expiry_month: None,
                expiry_year: None,
                reason: "Hardship discount".to_string(),
            },
        )
        .await?;

    // January 2024: the March adjustment has not taken effect yet.
    let before = ctx.fee_service.effective_fee(club.id, member.id, 1, 2024).await?;
    assert_eq!(before.amount_cents, 65000);
    assert_eq!(before.basis, FeeBasis::LevelDefault);

    // March onwards it applies, regardless of the level default.
    let after = ctx.fee_service.effective_fee(club.id, member.id, 3, 2024).await?;
    assert_eq!(after.amount_cents, 40000);
    assert_eq!(after.basis, FeeBasis::PermanentAdjustment);

    let much_later = ctx.fee_service.effective_fee(club.id, member.id, 6, 2025).await?;
    assert_eq!(much_later.amount_cents, 40000);

    Ok(())
}

#[tokio::test]
async fn temporary_adjustment_applies_only_within_its_window() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    let member = create_member(&ctx, club.id, guardian.id, "Level 1", None).await?;

    // Fees waived January through March 2024.
    ctx.adjustment_repo
        .create(
            club.id,
            CreateFeeAdjustmentRequest {
                member_id: member.id,
                kind: AdjustmentKind::Temporary,
                adjusted_fee_cents: 0,
                effective_month: 1,
                effective_year: 2024,
                expiry_month: Some(3),
                expiry_year: Some(2024),
                reason: "Injury recovery".to_string(),
            },
        )
        .await?;

    let during = ctx.fee_service.effective_fee(club.id, member.id, 2, 2024).await?;
    assert_eq!(during.amount_cents, 0);
    assert_eq!(during.basis, FeeBasis::TemporaryAdjustment);
    assert_eq!(during.note.as_deref(), Some("Injury recovery"));

    // April: the waiver has lapsed, back to the level default.
    let after = ctx.fee_service.effective_fee(club.id, member.id, 4, 2024).await?;
    assert_eq!(after.amount_cents, 65000);
    assert_eq!(after.basis, FeeBasis::LevelDefault);
    assert!(after.note.is_none());

    Ok(())
}

#[tokio::test]
async fn temporary_beats_permanent_and_member_override() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    // Member has a personal override of R500.
    let member = create_member(&ctx, club.id, guardian.id, "Level 1", Some(50000)).await?;

    ctx.adjustment_repo
        .create(
            club.id,
            CreateFeeAdjustmentRequest {
                member_id: member.id,
                kind: AdjustmentKind::Permanent,
                adjusted_fee_cents: 45000,
                effective_month: 1,
                effective_year: 2024,
                expiry_month: None,
                expiry_year: None,
                reason: "Loyalty rate".to_string(),
            },
        )
        .await?;
    ctx.adjustment_repo
        .create(
            club.id,
            CreateFeeAdjustmentRequest {
                member_id: member.id,
                kind: AdjustmentKind::Temporary,
                adjusted_fee_cents: 20000,
                effective_month: 2,
                effective_year: 2024,
                expiry_month: Some(2),
                expiry_year: Some(2024),
                reason: "Half month".to_string(),
            },
        )
        .await?;

    let during = ctx.fee_service.effective_fee(club.id, member.id, 2, 2024).await?;
    assert_eq!(during.amount_cents, 20000);
    assert_eq!(during.basis, FeeBasis::TemporaryAdjustment);

    // Outside the temporary window the permanent adjustment wins over
    // the member override.
    let outside = ctx.fee_service.effective_fee(club.id, member.id, 3, 2024).await?;
    assert_eq!(outside.amount_cents, 45000);
    assert_eq!(outside.basis, FeeBasis::PermanentAdjustment);

    Ok(())
}

#[tokio::test]
async fn latest_permanent_adjustment_wins() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    let member = create_member(&ctx, club.id, guardian.id, "Level 1", None).await?;

    ctx.adjustment_repo
        .create(
            club.id,
            CreateFeeAdjustmentRequest {
                member_id: member.id,
                kind: AdjustmentKind::Permanent,
                adjusted_fee_cents: 40000,
                effective_month: 1,
                effective_year: 2024,
                expiry_month: None,
                expiry_year: None,
                reason: "Old rate".to_string(),
            },
        )
        .await?;
    ctx.adjustment_repo
        .create(
            club.id,
            CreateFeeAdjustmentRequest {
                member_id: member.id,
                kind: AdjustmentKind::Permanent,
                adjusted_fee_cents: 47000,
                effective_month: 4,
                effective_year: 2024,
                expiry_month: None,
                expiry_year: None,
                reason: "Revised rate".to_string(),
            },
        )
        .await?;

    let fee = ctx.fee_service.effective_fee(club.id, member.id, 6, 2024).await?;
    assert_eq!(fee.amount_cents, 47000);

    // Before the revision takes effect the older one still applies.
    let earlier = ctx.fee_service.effective_fee(club.id, member.id, 2, 2024).await?;
    assert_eq!(earlier.amount_cents, 40000);

    Ok(())
}

#[tokio::test]
async fn deactivated_adjustment_no_longer_applies() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let ctx = service_context(pool);
    let club = bootstrap_club(&ctx).await?;
    let guardian = create_guardian(&ctx, club.id).await?;
    let member = create_member(&ctx, club.id, guardian.id, "Level 2", None).await?;

    let adjustment = ctx
        .adjustment_repo
        .create(
            club.id,
            CreateFeeAdjustmentRequest {
                member_id: member.id,
                kind: AdjustmentKind::Permanent,
                adjusted_fee_cents: 30000,
                effective_month: 1,
                effective_year: 2024,
                expiry_month: None,
                expiry_year: None,
                reason: "Scholarship".to_string(),
            },
        )
        .await?;

    let before = ctx.fee_service.effective_fee(club.id, member.id, 5, 2024).await?;
    assert_eq!(before.amount_cents, 30000);

    ctx.adjustment_repo.deactivate(club.id, adjustment.id).await?;

    let after = ctx.fee_service.effective_fee(club.id, member.id, 5, 2024).await?;
    assert_eq!(after.amount_cents, 72000);
    assert_eq!(after.basis, FeeBasis::LevelDefault);

    Ok(())
}
