//! # BulkBuy server
//! This module hosts the HTTP and WebSocket surface of the BulkBuy coordination service. It is responsible for:
//! * Accepting group, commitment and product requests and driving the coordination engine.
//! * Receiving hold webhooks from PayGate and applying them to the commitment ledger.
//! * Fanning group events out to WebSocket subscribers in real time.
//! * Running the background expiration sweeper.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The main routes the server exposes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/auth`: Issues signed access tokens for the WebSocket endpoint.
//! * `/api/groups`, `/api/groups/{id}/commitments` and friends: The coordination API.
//! * `/webhook/paygate`: The HMAC-verified webhook route for PayGate hold events.
//! * `/ws`: The real-time event stream.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sweeper;
pub mod ws;

#[cfg(test)]
mod endpoint_tests;
