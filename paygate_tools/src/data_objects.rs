use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire names of the webhook events PayGate delivers about holds.
pub const EVENT_HOLD_SUCCEEDED: &str = "hold.succeeded";
pub const EVENT_HOLD_FAILED: &str = "hold.failed";
pub const EVENT_HOLD_CANCELED: &str = "hold.canceled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldWireStatus {
    Held,
    Captured,
    Released,
}

/// Request body of `POST /v1/holds`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldRequest {
    pub amount_cents: i64,
    pub currency: String,
    /// Free-form reconciliation context echoed back in webhooks and reports.
    pub reference: HoldReference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldReference {
    pub group_id: i64,
    pub buyer_id: String,
    pub quantity: i64,
}

/// A hold as PayGate represents it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub id: String,
    pub status: HoldWireStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Body of a PayGate webhook delivery. The signature over the raw body travels in
/// the `x-paygate-hmac-sha256` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub hold_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
