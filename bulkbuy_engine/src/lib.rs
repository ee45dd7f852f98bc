//! BulkBuy Coordination Engine
//!
//! The coordination engine is the core of the BulkBuy group-buying service: it aggregates individual purchase
//! commitments into buying groups that unlock a bulk discount when enough neighbours join. This library contains
//! the full state machine and is server-agnostic.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access the database directly. Instead, use the flow API. The exception is the data types used in the database,
//!    which are defined in the [`mod@db_types`] module and are public.
//! 2. The engine public API ([`GroupFlowApi`]). This drives every state change: creating groups, accepting and
//!    withdrawing commitments, converting filled groups into fulfilment orders, sweeping expired groups and applying
//!    payment-processor webhook updates. Backends implement the traits in [`mod@traits`] to plug in underneath it.
//! 3. External collaborators: the [`traits::PaymentProcessor`] and [`traits::Geocoder`] contracts, with the
//!    in-process [`SandboxProcessor`] and [`StaticGeocoder`] implementations.
//!
//! The engine also emits a set of events that can be subscribed to. These events fire after each durable state
//! change. A simple actor framework is used so that you can easily hook into them and perform custom actions, such
//! as fanning progress out to WebSocket subscribers.
pub mod db_types;
pub mod events;
mod geocoding;
pub mod helpers;
mod sandbox;
mod bbe_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use bbe_api::{
    CommitOutcome,
    CommitRequest,
    CoordinationPolicy,
    GroupFlowApi,
    GroupFlowError,
    GroupLocks,
    GroupQueryFilter,
    GroupSnapshot,
    HoldEventKind,
};
pub use geocoding::{FallbackGeocoder, StaticGeocoder};
pub use sandbox::{SandboxHold, SandboxHoldState, SandboxProcessor};
