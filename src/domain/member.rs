use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An enrolled child. `guardian_id` names the user responsible for this
/// member's fees; invoices are raised against that payer, not the child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub club_id: Uuid,
    pub guardian_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub level: String,
    /// Personal monthly fee, overriding the level default when set.
    pub monthly_fee_cents: Option<i64>,
    pub status: MemberStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Only active members are billed by the monthly run.
    pub fn is_billable(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MemberStatus {
    Active,
    Trial,
    Withdrawn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMemberRequest {
    pub guardian_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub level: String,
    pub monthly_fee_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateMemberRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub level: Option<String>,
    /// `Some(None)` clears the override, `Some(Some(_))` replaces it.
    pub monthly_fee_cents: Option<Option<i64>>,
    pub status: Option<MemberStatus>,
    pub notes: Option<String>,
}
