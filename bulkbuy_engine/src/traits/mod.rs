//! # Storage and collaborator contracts.
//!
//! This module defines the interface contracts of the engine's *backends* and
//! external collaborators.
//!
//! * [`CoordinationDatabase`] is the write side: every atomic mutation the flow API
//!   performs on groups, commitments, orders and the event log.
//! * [`GroupManagement`] is the read side: queries over the same records.
//! * [`PaymentProcessor`] is the pre-authorize/capture/release contract with the
//!   external processor, including its idempotency requirements.
//! * [`Geocoder`] resolves postcodes to coordinates with a confidence level.
mod coordination_database;
mod data_objects;
mod geocoding;
mod group_management;
mod payment_processor;

pub use coordination_database::{CoordinationDatabase, CoordinationDbError};
pub use data_objects::{ConversionResult, SweepResult};
pub use geocoding::{GeocodeConfidence, GeocodedLocation, Geocoder, GeocodingError};
pub use group_management::{GroupApiError, GroupManagement};
pub use payment_processor::{HoldMetadata, PaymentProcessor, PaymentProcessorError};
