//! Shared plumbing for the endpoint tests.
//!
//! Tests run against the real engine on a throwaway SQLite database, with the
//! in-process sandbox standing in for PayGate. No HTTP ports are opened;
//! everything goes through actix's in-memory test service.

use std::time::Duration;

use actix_web::web;
use bb_common::{Money, Secret};
use bulkbuy_engine::{
    db_types::NewProduct,
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path},
    traits::CoordinationDatabase,
    FallbackGeocoder,
    GroupFlowApi,
    SandboxProcessor,
    SqliteDatabase,
    StaticGeocoder,
};

use crate::{
    auth::TokenIssuer,
    routes::{CoordinationApi, ServerGeocoder},
    ws::BroadcastRegistry,
};

pub struct TestContext {
    pub api: web::Data<CoordinationApi>,
    pub processor: SandboxProcessor,
    pub db_url: String,
}

pub async fn setup() -> TestContext {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let processor = SandboxProcessor::new();
    let api = GroupFlowApi::new(db, crate::integrations::ServerProcessor::Sandbox(processor.clone()), EventProducers::default());
    TestContext { api: web::Data::new(api), processor, db_url: url }
}

/// Closes the pool and deletes the temporary database file.
pub async fn tear_down(ctx: TestContext) {
    let path = ctx.db_url.trim_start_matches("sqlite://").to_string();
    // the sweeper is not running in tests, so the Arc in `api` is the only handle
    if let Some(mut api) = std::sync::Arc::into_inner(ctx.api.into_inner()) {
        let _ = api.db_mut().close().await;
    }
    let _ = std::fs::remove_file(path);
}

pub fn test_geocoder() -> web::Data<ServerGeocoder> {
    web::Data::new(FallbackGeocoder::new(StaticGeocoder::new(), Duration::from_millis(200), StaticGeocoder::new()))
}

pub fn test_issuer() -> web::Data<TokenIssuer> {
    web::Data::new(TokenIssuer::new(Secret::new("endpoint-test-secret".to_string())))
}

pub fn test_registry() -> web::Data<BroadcastRegistry> {
    web::Data::new(BroadcastRegistry::new())
}

pub async fn seed_product(ctx: &TestContext, id: &str, unit_price_cents: i64, stock: i64) {
    let product = NewProduct {
        id: id.to_string(),
        name: format!("Test product {id}"),
        unit_price: Money::from_cents(unit_price_cents),
        available_stock: stock,
    };
    ctx.api.db().upsert_product(product).await.expect("Error seeding product");
}

/// JSON body for a group whose center resolves via the built-in geocoder.
pub fn group_body(product_id: &str, target: i64, min: i64, discount: i64) -> serde_json::Value {
    serde_json::json!({
        "product_id": product_id,
        "postcode": "10435",
        "radius_km": 10.0,
        "target_quantity": target,
        "min_quantity": min,
        "discount_percent": discount,
        "expires_at": chrono::Utc::now() + chrono::Duration::hours(1),
    })
}

pub fn commit_body(buyer_id: &str, quantity: i64) -> serde_json::Value {
    serde_json::json!({
        "buyer_id": buyer_id,
        "quantity": quantity,
        "postcode": "10435",
    })
}
