use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub club_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// The gateway's own transaction identifier, once known. Also the
    /// dedupe key for redelivered notifications.
    pub gateway_tx_id: Option<String>,
    /// Gateway diagnostic fields, merged across notifications.
    pub metadata: serde_json::Value,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Pending is the only state with outgoing edges. Completed, Failed
    /// and Cancelled are terminal; a notification that would move a
    /// terminal payment elsewhere is a conflict, not an overwrite.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        match self {
            PaymentStatus::Pending => true,
            _ => self == next,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != PaymentStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    PayFast,
    Yoco,
    Eft,
    Manual,
}

/// One immutable audit-trail entry for a payment state change. Rows are
/// only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentActivity {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub club_id: Uuid,
    pub kind: PaymentActivityKind,
    pub message: String,
    pub gateway_tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentActivityKind {
    Initiated,
    Completed,
    Failed,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_reaches_every_terminal_state() {
        for next in [
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
        ] {
            assert!(PaymentStatus::Pending.can_transition_to(next));
        }
    }

    #[test]
    fn terminal_states_only_allow_self_transitions() {
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Completed));
        assert!(PaymentStatus::Completed.can_transition_to(PaymentStatus::Completed));
    }
}
