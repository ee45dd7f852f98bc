//! The group coordination flow API.
//!
//! [`GroupFlowApi`] drives every state change of the engine: creating groups,
//! accepting and withdrawing commitments, converting filled groups into fulfilment
//! orders, sweeping expired groups, and applying processor webhook updates. It is
//! generic over the storage backend and the payment processor so tests can swap in
//! the sandbox implementations.

mod errors;
mod group_flow_api;
mod group_objects;
mod locks;

pub use errors::GroupFlowError;
pub use group_flow_api::{CoordinationPolicy, GroupFlowApi, HoldEventKind};
pub use group_objects::{CommitOutcome, CommitRequest, GroupQueryFilter, GroupSnapshot};
pub use locks::GroupLocks;
