use std::sync::Arc;

use chrono::{Datelike, Utc};
use uuid::Uuid;

use crate::{
    domain::{AdjustmentKind, FeeAdjustment, FeeBasis, Member, ResolvedFee},
    error::{AppError, Result},
    repository::{ClubRepository, FeeAdjustmentRepository, MemberRepository},
};

/// Resolves the monthly amount due for one member and one billing
/// period by walking the override chain: active temporary adjustment,
/// then latest permanent adjustment, then the member's own fee, then
/// the level default, then zero.
pub struct FeeService {
    club_repo: Arc<dyn ClubRepository>,
    member_repo: Arc<dyn MemberRepository>,
    adjustment_repo: Arc<dyn FeeAdjustmentRepository>,
}

impl FeeService {
    pub fn new(
        club_repo: Arc<dyn ClubRepository>,
        member_repo: Arc<dyn MemberRepository>,
        adjustment_repo: Arc<dyn FeeAdjustmentRepository>,
    ) -> Self {
        Self {
            club_repo,
            member_repo,
            adjustment_repo,
        }
    }

    /// Effective fee for a member in the given period. Called once per
    /// member by the invoice run and on demand for display.
    pub async fn effective_fee(
        &self,
        club_id: Uuid,
        member_id: Uuid,
        month: u32,
        year: i32,
    ) -> Result<ResolvedFee> {
        let member = self
            .member_repo
            .find_by_id(club_id, member_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

        self.effective_fee_for(&member, month, year).await
    }

    /// Same as `effective_fee` with the period defaulting to the
    /// current month, for the "what is this member paying now" query.
    pub async fn current_fee(&self, club_id: Uuid, member_id: Uuid) -> Result<ResolvedFee> {
        let now = Utc::now();
        self.effective_fee(club_id, member_id, now.month(), now.year())
            .await
    }

    pub async fn effective_fee_for(
        &self,
        member: &Member,
        month: u32,
        year: i32,
    ) -> Result<ResolvedFee> {
        let level_default = self
            .club_repo
            .find_level_fee(member.club_id, &member.level)
            .await?
            .map(|f| f.monthly_fee_cents);

        // An adjustment-lookup failure must not sink a whole invoice
        // run; charge the base fee and flag the result as degraded.
        match self.adjustment_repo.list_for_member(member.id).await {
            Ok(adjustments) => Ok(resolve_fee(
                member.monthly_fee_cents,
                level_default,
                &adjustments,
                month,
                year,
            )),
            Err(e) => {
                tracing::warn!(
                    member_id = %member.id,
                    error = %e,
                    "adjustment lookup failed, resolving from base fee"
                );
                let mut fee = resolve_fee(member.monthly_fee_cents, level_default, &[], month, year);
                fee.degraded = true;
                Ok(fee)
            }
        }
    }
}

/// Pure resolution over already-loaded inputs.
///
/// A temporary adjustment whose expiry window covers the queried period
/// wins outright and carries its reason as the note; an expired one is
/// skipped, not an error. Among permanent adjustments the latest dated
/// wins, with creation time breaking effective-date ties.
pub fn resolve_fee(
    member_override_cents: Option<i64>,
    level_default_cents: Option<i64>,
    adjustments: &[FeeAdjustment],
    month: u32,
    year: i32,
) -> ResolvedFee {
    let mut active: Vec<&FeeAdjustment> = adjustments
        .iter()
        .filter(|a| a.in_effect(month, year))
        .collect();
    active.sort_by(|a, b| {
        (b.effective_year, b.effective_month, b.created_at)
            .cmp(&(a.effective_year, a.effective_month, a.created_at))
    });

    if let Some(temp) = active
        .iter()
        .find(|a| a.kind == AdjustmentKind::Temporary && a.covers(month, year))
    {
        return ResolvedFee {
            amount_cents: temp.adjusted_fee_cents,
            basis: FeeBasis::TemporaryAdjustment,
            note: Some(temp.reason.clone()),
            degraded: false,
        };
    }

    if let Some(perm) = active.iter().find(|a| a.kind == AdjustmentKind::Permanent) {
        return ResolvedFee {
            amount_cents: perm.adjusted_fee_cents,
            basis: FeeBasis::PermanentAdjustment,
            note: None,
            degraded: false,
        };
    }

    match (member_override_cents, level_default_cents) {
        (Some(fee), _) => ResolvedFee::base(fee, FeeBasis::MemberOverride),
        (None, Some(fee)) => ResolvedFee::base(fee, FeeBasis::LevelDefault),
        (None, None) => ResolvedFee::base(0, FeeBasis::Unpriced),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn adjustment(
        kind: AdjustmentKind,
        cents: i64,
        effective: (u32, i32),
        expiry: Option<(u32, i32)>,
        created_offset_secs: i64,
    ) -> FeeAdjustment {
        FeeAdjustment {
            id: Uuid::new_v4(),
            club_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            kind,
            adjusted_fee_cents: cents,
            effective_month: effective.0,
            effective_year: effective.1,
            expiry_month: expiry.map(|e| e.0),
            expiry_year: expiry.map(|e| e.1),
            reason: "test".to_string(),
            is_active: true,
            created_at: Utc::now() + Duration::seconds(created_offset_secs),
        }
    }

    #[test]
    fn permanent_tie_break_prefers_most_recently_created() {
        let older = adjustment(AdjustmentKind::Permanent, 40000, (1, 2024), None, 0);
        let newer = adjustment(AdjustmentKind::Permanent, 45000, (1, 2024), None, 60);

        let fee = resolve_fee(None, Some(65000), &[older, newer], 6, 2024);
        assert_eq!(fee.amount_cents, 45000);
        assert_eq!(fee.basis, FeeBasis::PermanentAdjustment);
    }

    #[test]
    fn inactive_adjustments_are_ignored() {
        let mut adj = adjustment(AdjustmentKind::Permanent, 40000, (1, 2024), None, 0);
        adj.is_active = false;

        let fee = resolve_fee(None, Some(65000), &[adj], 6, 2024);
        assert_eq!(fee.amount_cents, 65000);
        assert_eq!(fee.basis, FeeBasis::LevelDefault);
    }

    #[test]
    fn temporary_without_expiry_is_treated_as_lapsed() {
        let adj = adjustment(AdjustmentKind::Temporary, 0, (1, 2024), None, 0);

        let fee = resolve_fee(Some(50000), None, &[adj], 2, 2024);
        assert_eq!(fee.amount_cents, 50000);
        assert_eq!(fee.basis, FeeBasis::MemberOverride);
    }
}
