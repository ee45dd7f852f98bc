use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use bulkbuy_engine::{
    events::{EventHandlers, EventHooks},
    CoordinationPolicy,
    FallbackGeocoder,
    GroupFlowApi,
    SandboxProcessor,
    SqliteDatabase,
    StaticGeocoder,
};
use log::*;
use paygate_tools::PayGateApi;

use crate::{
    auth::TokenIssuer,
    config::ServerConfig,
    errors::ServerError,
    integrations::ServerProcessor,
    middleware::SignatureVerifier,
    routes::{
        auth,
        buyer_commitments,
        cancel_commitment,
        commit_to_group,
        create_group,
        group_events,
        group_orders,
        group_status,
        health,
        paygate_webhook,
        search_groups,
        trigger_sweep,
        upsert_product,
        ws_connect,
    },
    sweeper::start_sweeper,
    ws::BroadcastRegistry,
};

const GEOCODE_TIMEOUT_MS: u64 = 1500;
const EVENT_BUFFER_SIZE: usize = 100;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::BackendError(e.to_string()))
}

/// Builds the HTTP server. Must be called from within a tokio runtime, since the
/// event handler tasks and the sweeper are spawned here.
///
/// The flow API is constructed exactly once and shared across workers and the
/// sweeper. Its per-group locks are what serialize concurrent commits, so handing
/// each worker its own instance would silently break that guarantee.
pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let registry = BroadcastRegistry::new();
    let mut hooks = EventHooks::default();
    let fanout = registry.clone();
    hooks.on_group_event(move |event| {
        let fanout = fanout.clone();
        Box::pin(async move {
            match serde_json::to_string(&event) {
                Ok(frame) => fanout.publish(event.group_id(), frame),
                Err(e) => error!("📬️ Could not serialize group event for broadcast: {e}"),
            }
        })
    });
    hooks.on_group_finalized(|event| {
        Box::pin(async move {
            info!(
                "🏁️ Group {} finalized as {} with {} orders created and {} capture failures",
                event.group_id, event.status, event.orders_created, event.orders_failed
            );
        })
    });
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    handlers.start_handlers();

    let processor = if config.paygate.use_sandbox {
        ServerProcessor::Sandbox(SandboxProcessor::new())
    } else {
        let api = PayGateApi::new(config.paygate.api.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        ServerProcessor::PayGate(api)
    };
    let policy =
        CoordinationPolicy { threshold_percent: config.threshold_percent, vat_percent: config.vat_percent };
    let api = web::Data::new(GroupFlowApi::new(db, processor, producers).with_policy(policy));
    start_sweeper(api.clone().into_inner(), config.sweep_interval_secs);

    let issuer = TokenIssuer::new(config.api_secret.clone());
    // The built-in table stands in as the primary for now. A remote provider slots
    // in as the primary once one is configured; the table stays as the fallback.
    let geocoder = FallbackGeocoder::new(
        StaticGeocoder::new(),
        Duration::from_millis(GEOCODE_TIMEOUT_MS),
        StaticGeocoder::new(),
    );
    let registry = web::Data::new(registry);
    let webhook_secret = config.paygate.api.webhook_secret.clone();
    let hmac_checks = config.paygate.hmac_checks;

    let srv = HttpServer::new(move || {
        let webhook_scope = web::scope("/webhook")
            .wrap(SignatureVerifier::new(webhook_secret.clone(), hmac_checks))
            .service(paygate_webhook);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("bbs::access_log"))
            .app_data(api.clone())
            .app_data(registry.clone())
            .app_data(web::Data::new(issuer.clone()))
            .app_data(web::Data::new(geocoder.clone()))
            .service(health)
            .service(auth)
            .service(upsert_product)
            .service(create_group)
            .service(search_groups)
            .service(group_status)
            .service(group_events)
            .service(group_orders)
            .service(commit_to_group)
            .service(cancel_commitment)
            .service(buyer_commitments)
            .service(trigger_sweep)
            .service(webhook_scope)
            .service(ws_connect)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
