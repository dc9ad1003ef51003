pub mod payfast;
pub mod yoco;

pub use payfast::PayFastClient;
pub use yoco::YocoClient;

use uuid::Uuid;

use crate::domain::{PaymentMethod, PaymentStatus};

/// A gateway notification normalized to the fields the reconciler
/// needs, after the gateway-specific signature checks have passed.
/// The three correlation ids were embedded by us at initiation time;
/// the reconciler refuses the notification unless all three match a
/// payment row.
#[derive(Debug, Clone)]
pub struct GatewayNotification {
    pub gateway: PaymentMethod,
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub club_id: Uuid,
    pub gateway_tx_id: String,
    pub status: PaymentStatus,
    /// The gateway's own status vocabulary, kept for the audit trail.
    pub raw_status: String,
    pub amount_cents: Option<i64>,
    pub reason: Option<String>,
    /// Gateway diagnostic fields to merge into the payment metadata.
    pub metadata: serde_json::Value,
}
