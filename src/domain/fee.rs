use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A per-member override of the monthly fee. Permanent adjustments
/// apply from their effective period onwards; temporary ones also carry
/// an expiry period (inclusive on both ends).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeAdjustment {
    pub id: Uuid,
    pub club_id: Uuid,
    pub member_id: Uuid,
    pub kind: AdjustmentKind,
    pub adjusted_fee_cents: i64,
    pub effective_month: u32,
    pub effective_year: i32,
    pub expiry_month: Option<u32>,
    pub expiry_year: Option<i32>,
    pub reason: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdjustmentKind {
    Permanent,
    Temporary,
}

impl FeeAdjustment {
    /// Has this adjustment taken effect by the queried period?
    pub fn in_effect(&self, month: u32, year: i32) -> bool {
        self.is_active
            && (self.effective_year < year
                || (self.effective_year == year && self.effective_month <= month))
    }

    /// For temporary adjustments: does the expiry window still cover
    /// the queried period? Permanent adjustments never expire.
    pub fn covers(&self, month: u32, year: i32) -> bool {
        match self.kind {
            AdjustmentKind::Permanent => true,
            AdjustmentKind::Temporary => match (self.expiry_year, self.expiry_month) {
                (Some(ey), Some(em)) => ey > year || (ey == year && em >= month),
                // A temporary adjustment without an expiry is malformed;
                // treat it as lapsed rather than charging it forever.
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFeeAdjustmentRequest {
    pub member_id: Uuid,
    pub kind: AdjustmentKind,
    pub adjusted_fee_cents: i64,
    pub effective_month: u32,
    pub effective_year: i32,
    pub expiry_month: Option<u32>,
    pub expiry_year: Option<i32>,
    pub reason: String,
}

/// Where a resolved fee came from, most specific source first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FeeBasis {
    TemporaryAdjustment,
    PermanentAdjustment,
    MemberOverride,
    LevelDefault,
    Unpriced,
}

/// Outcome of fee resolution for one member and one billing period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedFee {
    pub amount_cents: i64,
    pub basis: FeeBasis,
    /// Human-readable note carried from a winning temporary adjustment.
    pub note: Option<String>,
    /// Set when the adjustment lookup failed and the amount fell back
    /// to the override/default chain.
    pub degraded: bool,
}

impl ResolvedFee {
    pub fn base(amount_cents: i64, basis: FeeBasis) -> Self {
        Self {
            amount_cents,
            basis,
            note: None,
            degraded: false,
        }
    }
}
