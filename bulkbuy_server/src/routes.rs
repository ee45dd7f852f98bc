//! Request handlers for the BulkBuy server.
//!
//! Handlers are deliberately thin: they translate HTTP payloads into flow-API calls
//! and let [`ServerError`]'s `ResponseError` impl map rejections onto status codes
//! and `{"error", "code"}` bodies. All coordination logic lives in the engine.

use std::str::FromStr;

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use bulkbuy_engine::{
    db_types::{GroupId, GroupStatus, NewGroup, NewProduct},
    traits::{CoordinationDatabase, Geocoder, GroupManagement},
    CommitRequest,
    GroupFlowApi,
    GroupQueryFilter,
    GroupSnapshot,
    HoldEventKind,
    SqliteDatabase,
    StaticGeocoder,
};
use log::*;
use paygate_tools::{EVENT_HOLD_CANCELED, EVENT_HOLD_FAILED, EVENT_HOLD_SUCCEEDED, WebhookEvent};
use serde::Deserialize;

use crate::{
    auth::TokenIssuer,
    data_objects::{AuthParams, AuthResponse, CancelParams, CommitParams, JsonResponse, NewGroupParams},
    errors::{AuthError, ServerError},
    integrations::ServerProcessor,
    ws::{serve_connection, BroadcastRegistry},
};

/// The one flow-API instance every handler and the sweeper share.
pub type CoordinationApi = GroupFlowApi<SqliteDatabase, ServerProcessor>;
pub type ServerGeocoder = bulkbuy_engine::FallbackGeocoder<StaticGeocoder>;

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Auth  ----------------------------------------------------

/// Issues a signed WebSocket access token for a buyer.
#[post("/auth")]
pub async fn auth(body: web::Json<AuthParams>, issuer: web::Data<TokenIssuer>) -> HttpResponse {
    let params = body.into_inner();
    debug!("🔐️ Issuing access token for buyer {}", params.buyer_id);
    let token = issuer.issue(&params.buyer_id);
    HttpResponse::Ok().json(AuthResponse { token })
}

//----------------------------------------------   Products  ----------------------------------------------------

#[post("/api/products")]
pub async fn upsert_product(
    body: web::Json<NewProduct>,
    api: web::Data<CoordinationApi>,
) -> Result<HttpResponse, ServerError> {
    let product = body.into_inner();
    info!("🏷️️ Upserting product {} ({})", product.id, product.name);
    let product = api.db().upsert_product(product).await.map_err(|e| ServerError::BackendError(e.to_string()))?;
    Ok(HttpResponse::Ok().json(product))
}

//----------------------------------------------   Groups  ----------------------------------------------------

#[post("/api/groups")]
pub async fn create_group(
    body: web::Json<NewGroupParams>,
    api: web::Data<CoordinationApi>,
    geocoder: web::Data<ServerGeocoder>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    let (center, geocoded_area) = match (params.center, &params.postcode) {
        (Some(center), _) => (center, None),
        (None, Some(postcode)) => {
            let loc = geocoder.geocode(postcode).await.map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
            (loc.point, Some(loc.area_name))
        },
        (None, None) => {
            return Err(ServerError::InvalidRequestBody("Either center or postcode must be provided".into()));
        },
    };
    let area = params
        .area
        .or(geocoded_area)
        .ok_or_else(|| ServerError::InvalidRequestBody("An area name is required when center is explicit".into()))?;
    let new_group = NewGroup {
        product_id: params.product_id,
        area,
        center,
        radius_km: params.radius_km,
        target_quantity: params.target_quantity,
        min_quantity: params.min_quantity,
        discount_percent: params.discount_percent,
        expires_at: params.expires_at,
    };
    let group = api.create_group(new_group).await?;
    info!("🛒 Created group {} for {} in {}", group.id, group.product_id, group.area);
    Ok(HttpResponse::Ok().json(GroupSnapshot::from(&group)))
}

/// Query-string form of [`GroupQueryFilter`]. `status` takes a comma-separated list
/// of status names.
#[derive(Debug, Default, Deserialize)]
pub struct GroupSearchQuery {
    pub product_id: Option<String>,
    pub area: Option<String>,
    pub status: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TryFrom<GroupSearchQuery> for GroupQueryFilter {
    type Error = ServerError;

    fn try_from(q: GroupSearchQuery) -> Result<Self, Self::Error> {
        let status = q
            .status
            .map(|s| {
                s.split(',')
                    .map(|part| {
                        GroupStatus::from_str(part.trim()).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))
                    })
                    .collect::<Result<Vec<GroupStatus>, ServerError>>()
            })
            .transpose()?;
        Ok(GroupQueryFilter { product_id: q.product_id, area: q.area, status, since: q.since, until: q.until })
    }
}

#[get("/api/groups")]
pub async fn search_groups(
    query: web::Query<GroupSearchQuery>,
    api: web::Data<CoordinationApi>,
) -> Result<HttpResponse, ServerError> {
    let filter = GroupQueryFilter::try_from(query.into_inner())?;
    trace!("🔍️ Group search: {filter:?}");
    let groups = api.db().search_groups(filter).await.map_err(|e| ServerError::BackendError(e.to_string()))?;
    let snapshots = groups.iter().map(GroupSnapshot::from).collect::<Vec<GroupSnapshot>>();
    Ok(HttpResponse::Ok().json(snapshots))
}

#[get("/api/groups/{id}")]
pub async fn group_status(
    path: web::Path<i64>,
    api: web::Data<CoordinationApi>,
) -> Result<HttpResponse, ServerError> {
    let group_id = GroupId(path.into_inner());
    let group = api
        .db()
        .fetch_group(group_id)
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or(bulkbuy_engine::GroupFlowError::GroupNotFound(group_id))?;
    Ok(HttpResponse::Ok().json(GroupSnapshot::from(&group)))
}

#[get("/api/groups/{id}/events")]
pub async fn group_events(
    path: web::Path<i64>,
    api: web::Data<CoordinationApi>,
) -> Result<HttpResponse, ServerError> {
    let group_id = GroupId(path.into_inner());
    let events =
        api.db().fetch_events_for_group(group_id).await.map_err(|e| ServerError::BackendError(e.to_string()))?;
    Ok(HttpResponse::Ok().json(events))
}

#[get("/api/groups/{id}/orders")]
pub async fn group_orders(
    path: web::Path<i64>,
    api: web::Data<CoordinationApi>,
) -> Result<HttpResponse, ServerError> {
    let group_id = GroupId(path.into_inner());
    let orders =
        api.db().fetch_orders_for_group(group_id).await.map_err(|e| ServerError::BackendError(e.to_string()))?;
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Commitments  ----------------------------------------------------

#[post("/api/groups/{id}/commitments")]
pub async fn commit_to_group(
    path: web::Path<i64>,
    body: web::Json<CommitParams>,
    api: web::Data<CoordinationApi>,
    geocoder: web::Data<ServerGeocoder>,
) -> Result<HttpResponse, ServerError> {
    let group_id = GroupId(path.into_inner());
    let params = body.into_inner();
    // Geocoding happens here, outside the group's critical section.
    let location = match params.location {
        Some(loc) => loc,
        None => {
            let loc = geocoder
                .geocode(&params.postcode)
                .await
                .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
            loc.point
        },
    };
    let req = CommitRequest {
        group_id,
        buyer_id: params.buyer_id,
        quantity: params.quantity,
        postcode: params.postcode,
        location,
    };
    let outcome = api.commit_to_group(req).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "commitment": outcome.commitment,
        "group": GroupSnapshot::from(&outcome.group),
        "group_completed": outcome.reached_target(),
    })))
}

#[post("/api/commitments/{id}/cancel")]
pub async fn cancel_commitment(
    path: web::Path<i64>,
    body: web::Json<CancelParams>,
    api: web::Data<CoordinationApi>,
) -> Result<HttpResponse, ServerError> {
    let commitment_id = path.into_inner();
    let params = body.into_inner();
    let outcome = api.cancel_commitment(commitment_id, &params.buyer_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "commitment": outcome.commitment,
        "group": GroupSnapshot::from(&outcome.group),
    })))
}

#[get("/api/buyers/{buyer_id}/commitments")]
pub async fn buyer_commitments(
    path: web::Path<String>,
    api: web::Data<CoordinationApi>,
) -> Result<HttpResponse, ServerError> {
    let buyer_id = path.into_inner();
    let commitments =
        api.db().fetch_commitments_for_buyer(&buyer_id).await.map_err(|e| ServerError::BackendError(e.to_string()))?;
    Ok(HttpResponse::Ok().json(commitments))
}

//----------------------------------------------   Sweep  ----------------------------------------------------

/// Manually triggers an expiration sweep. The background sweeper runs the same job
/// on a timer; this endpoint exists for operators and tests.
#[post("/api/sweep")]
pub async fn trigger_sweep(api: web::Data<CoordinationApi>) -> Result<HttpResponse, ServerError> {
    info!("🕰️ Manually triggered expiration sweep");
    let result = api.sweep_expired_groups().await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------

/// PayGate hold webhook. The HMAC middleware has already verified the signature.
///
/// Webhook responses must always be in the 200 range, otherwise PayGate keeps
/// retrying the delivery. Processing problems are reported in the body only.
#[post("/webhook/paygate")]
pub async fn paygate_webhook(
    req: HttpRequest,
    body: web::Json<WebhookEvent>,
    api: web::Data<CoordinationApi>,
) -> HttpResponse {
    trace!("🪝️ Received webhook request: {}", req.uri());
    let event = body.into_inner();
    let kind = match event.event.as_str() {
        EVENT_HOLD_SUCCEEDED => HoldEventKind::Succeeded,
        EVENT_HOLD_FAILED => HoldEventKind::Failed,
        EVENT_HOLD_CANCELED => HoldEventKind::Canceled,
        other => {
            info!("🪝️ Ignoring unrecognized PayGate event type: {other}");
            return HttpResponse::Ok().json(JsonResponse::success(format!("Ignored event type {other}")));
        },
    };
    let result = match api.apply_hold_update(&event.hold_id, kind).await {
        Ok(()) => {
            debug!("🪝️ Applied {} for hold {}", event.event, event.hold_id);
            JsonResponse::success("Hold update applied.")
        },
        Err(e) => {
            warn!("🪝️ Could not apply {} for hold {}. {e}", event.event, event.hold_id);
            JsonResponse::failure(e)
        },
    };
    HttpResponse::Ok().json(result)
}

//----------------------------------------------   WebSocket  ----------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Upgrades to a WebSocket for real-time group events. Requires a token from
/// `POST /auth` in the `token` query parameter.
#[get("/ws")]
pub async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<WsQuery>,
    issuer: web::Data<TokenIssuer>,
    registry: web::Data<BroadcastRegistry>,
    api: web::Data<CoordinationApi>,
) -> Result<HttpResponse, ServerError> {
    let token = query
        .into_inner()
        .token
        .ok_or_else(|| AuthError::PoorlyFormattedToken("no token provided".into()))
        .map_err(ServerError::AuthenticationError)?;
    let buyer_id = issuer.verify(&token)?;
    let (response, session, msg_stream) =
        actix_ws::handle(&req, stream).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let db = api.db().clone();
    let registry = registry.get_ref().clone();
    actix_web::rt::spawn(serve_connection(buyer_id, session, msg_stream, registry, db));
    Ok(response)
}
