use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use bb_common::Secret;
use bulkbuy_engine::{
    db_types::{CommitmentStatus, Coordinate, NewGroup},
    traits::GroupManagement,
    CommitRequest,
};
use chrono::{Duration, Utc};
use paygate_tools::{WebhookEvent, EVENT_HOLD_FAILED};

use super::helpers::{seed_product, setup, tear_down};
use crate::{
    helpers::calculate_hmac,
    middleware::{SignatureVerifier, SIGNATURE_HEADER},
    routes::paygate_webhook,
};

const WEBHOOK_SECRET: &str = "whsec_endpoint_tests";

fn configure(api: web::Data<crate::routes::CoordinationApi>, hmac_checks: bool) -> impl Fn(&mut ServiceConfig) {
    move |cfg| {
        let scope = web::scope("/webhook")
            .wrap(SignatureVerifier::new(Secret::new(WEBHOOK_SECRET.to_string()), hmac_checks))
            .service(paygate_webhook);
        cfg.app_data(api.clone()).service(scope);
    }
}

fn hold_event(event: &str, hold_id: &str) -> String {
    let event = WebhookEvent {
        event: event.to_string(),
        hold_id: hold_id.to_string(),
        created_at: Utc::now(),
        reason: Some("card expired".to_string()),
    };
    serde_json::to_string(&event).expect("serializing webhook event")
}

#[actix_web::test]
async fn unsigned_webhook_is_rejected() {
    let ctx = setup().await;
    let app = test::init_service(App::new().configure(configure(ctx.api.clone(), true))).await;
    let req = TestRequest::post()
        .uri("/webhook/paygate")
        .insert_header(("content-type", "application/json"))
        .set_payload(hold_event(EVENT_HOLD_FAILED, "pg_hold_missing"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    tear_down(ctx).await;
}

#[actix_web::test]
async fn badly_signed_webhook_is_rejected() {
    let ctx = setup().await;
    let app = test::init_service(App::new().configure(configure(ctx.api.clone(), true))).await;
    let body = hold_event(EVENT_HOLD_FAILED, "pg_hold_missing");
    let req = TestRequest::post()
        .uri("/webhook/paygate")
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, calculate_hmac("wrong-secret", body.as_bytes())))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    tear_down(ctx).await;
}

#[actix_web::test]
async fn signed_webhook_for_unknown_hold_still_acks() {
    let ctx = setup().await;
    let app = test::init_service(App::new().configure(configure(ctx.api.clone(), true))).await;
    let body = hold_event(EVENT_HOLD_FAILED, "pg_hold_unknown");
    let req = TestRequest::post()
        .uri("/webhook/paygate")
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, calculate_hmac(WEBHOOK_SECRET, body.as_bytes())))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(ack["success"], true);
    tear_down(ctx).await;
}

#[actix_web::test]
async fn hold_failure_withdraws_the_commitment() {
    let ctx = setup().await;
    seed_product(&ctx, "veggie-box", 1_000, 100).await;
    let center = Coordinate::new(52.5429, 13.3501);
    let group = ctx
        .api
        .create_group(NewGroup {
            product_id: "veggie-box".to_string(),
            area: "Berlin Moabit".to_string(),
            center,
            radius_km: 10.0,
            target_quantity: 10,
            min_quantity: 5,
            discount_percent: 10,
            expires_at: Utc::now() + Duration::hours(1),
        })
        .await
        .expect("creating group");
    let outcome = ctx
        .api
        .commit_to_group(CommitRequest {
            group_id: group.id,
            buyer_id: "alice".to_string(),
            quantity: 3,
            postcode: "10435".to_string(),
            location: center,
        })
        .await
        .expect("committing");
    let hold_ref = outcome.commitment.hold_ref.clone().expect("commitment should carry a hold");

    let app = test::init_service(App::new().configure(configure(ctx.api.clone(), true))).await;
    let body = hold_event(EVENT_HOLD_FAILED, &hold_ref);
    let req = TestRequest::post()
        .uri("/webhook/paygate")
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, calculate_hmac(WEBHOOK_SECRET, body.as_bytes())))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let commitment =
        ctx.api.db().fetch_commitment(outcome.commitment.id).await.expect("fetching").expect("commitment exists");
    assert_eq!(commitment.status, CommitmentStatus::Cancelled);
    let group = ctx.api.db().fetch_group(group.id).await.expect("fetching").expect("group exists");
    assert_eq!(group.current_quantity, 0);
    tear_down(ctx).await;
}

#[actix_web::test]
async fn disabled_hmac_checks_allow_unsigned_webhooks() {
    let ctx = setup().await;
    let app = test::init_service(App::new().configure(configure(ctx.api.clone(), false))).await;
    let req = TestRequest::post()
        .uri("/webhook/paygate")
        .insert_header(("content-type", "application/json"))
        .set_payload(hold_event("hold.someday_maybe", "pg_hold_unknown"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let ack: serde_json::Value = test::read_body_json(res).await;
    // unknown event types are acknowledged and ignored
    assert_eq!(ack["success"], true);
    tear_down(ctx).await;
}
