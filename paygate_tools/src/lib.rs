//! Client library for PayGate, the card processor behind the BulkBuy gateway.
//!
//! PayGate exposes a small REST API around payment holds (pre-authorizations) and
//! signs webhook deliveries with HMAC-SHA256. This crate covers exactly the slice
//! the coordination engine needs: place, capture and release holds, plus the wire
//! types of the webhook events. It knows nothing about groups or commitments.
mod api;
mod config;
mod error;

mod data_objects;

pub use api::PayGateApi;
pub use config::PayGateConfig;
pub use data_objects::{
    Hold,
    HoldReference,
    HoldRequest,
    HoldWireStatus,
    WebhookEvent,
    EVENT_HOLD_CANCELED,
    EVENT_HOLD_FAILED,
    EVENT_HOLD_SUCCEEDED,
};
pub use error::PayGateApiError;
