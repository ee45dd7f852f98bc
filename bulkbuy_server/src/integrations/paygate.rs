//! Bridges the PayGate REST client into the engine's [`PaymentProcessor`] contract.
//!
//! The server picks one of two processors at startup: the real PayGate API, or the
//! engine's in-process sandbox (`BB_PAYGATE_SANDBOX=1`). A small enum keeps the flow
//! API concrete over a single processor type.

use bb_common::Money;
use bulkbuy_engine::{
    traits::{HoldMetadata, PaymentProcessor, PaymentProcessorError},
    SandboxProcessor,
};
use log::*;
use paygate_tools::{HoldReference, PayGateApi, PayGateApiError};

#[derive(Clone)]
pub enum ServerProcessor {
    PayGate(PayGateApi),
    Sandbox(SandboxProcessor),
}

impl PaymentProcessor for ServerProcessor {
    async fn authorize(&self, amount: Money, meta: &HoldMetadata) -> Result<String, PaymentProcessorError> {
        match self {
            Self::PayGate(api) => {
                let reference = HoldReference {
                    group_id: meta.group_id.value(),
                    buyer_id: meta.buyer_id.clone(),
                    quantity: meta.quantity,
                };
                let hold = api.authorize_hold(amount.value(), reference).await.map_err(to_processor_error)?;
                debug!("💳 PayGate authorized hold {} for {amount}", hold.id);
                Ok(hold.id)
            },
            Self::Sandbox(sandbox) => sandbox.authorize(amount, meta).await,
        }
    }

    async fn capture(&self, hold_ref: &str) -> Result<(), PaymentProcessorError> {
        match self {
            Self::PayGate(api) => {
                api.capture_hold(hold_ref).await.map_err(to_processor_error)?;
                Ok(())
            },
            Self::Sandbox(sandbox) => sandbox.capture(hold_ref).await,
        }
    }

    async fn release(&self, hold_ref: &str) -> Result<(), PaymentProcessorError> {
        match self {
            Self::PayGate(api) => api.release_hold(hold_ref).await.map_err(to_processor_error),
            Self::Sandbox(sandbox) => sandbox.release(hold_ref).await,
        }
    }
}

fn to_processor_error(e: PayGateApiError) -> PaymentProcessorError {
    match e {
        PayGateApiError::Declined(msg) => PaymentProcessorError::Declined(msg),
        PayGateApiError::UnknownHold(hold_ref) => PaymentProcessorError::UnknownHold(hold_ref),
        PayGateApiError::QueryError { status, message } => {
            PaymentProcessorError::Protocol(format!("PayGate returned {status}: {message}"))
        },
        PayGateApiError::RestResponseError(msg) | PayGateApiError::Initialization(msg) => {
            PaymentProcessorError::Unavailable(msg)
        },
        PayGateApiError::JsonError(msg) => PaymentProcessorError::Protocol(msg),
    }
}
