use bb_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::GroupId;

/// Context attached to a hold so the processor side can be reconciled against the
/// ledger out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldMetadata {
    pub group_id: GroupId,
    pub buyer_id: String,
    pub quantity: i64,
}

/// Contract with the external payment processor.
///
/// Idempotency requirements, which every implementation must honor:
/// * [`Self::capture`] on an already-captured hold succeeds.
/// * [`Self::release`] on an already-released or unknown hold succeeds. Release is
///   the cleanup path of cancellations and failed groups; an unknown ref upstream
///   means there is nothing left to clean up, never a hard failure.
///
/// Authorization failures are final from the engine's point of view: the commit is
/// aborted and the buyer retries deliberately. The engine never retries an
/// `authorize` call silently.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor: Clone + Send + Sync {
    /// Places a hold for `amount` and returns the processor's hold reference.
    async fn authorize(&self, amount: Money, meta: &HoldMetadata) -> Result<String, PaymentProcessorError>;

    /// Converts the hold into a charge.
    async fn capture(&self, hold_ref: &str) -> Result<(), PaymentProcessorError>;

    /// Cancels the hold without charging it.
    async fn release(&self, hold_ref: &str) -> Result<(), PaymentProcessorError>;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentProcessorError {
    #[error("The processor declined the authorization: {0}")]
    Declined(String),
    #[error("The processor is unavailable: {0}")]
    Unavailable(String),
    #[error("Unknown hold reference: {0}")]
    UnknownHold(String),
    #[error("Processor protocol error: {0}")]
    Protocol(String),
}
