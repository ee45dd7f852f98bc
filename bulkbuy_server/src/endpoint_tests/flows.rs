use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use bulkbuy_engine::SandboxHoldState;
use log::*;

use super::helpers::{commit_body, group_body, seed_product, setup, tear_down, test_geocoder, test_issuer, test_registry};
use crate::routes::{
    auth,
    buyer_commitments,
    cancel_commitment,
    commit_to_group,
    create_group,
    group_orders,
    group_status,
    health,
    search_groups,
    upsert_product,
};

fn configure(api: web::Data<crate::routes::CoordinationApi>) -> impl Fn(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(api.clone())
            .app_data(test_geocoder())
            .app_data(test_issuer())
            .app_data(test_registry())
            .service(health)
            .service(auth)
            .service(upsert_product)
            .service(create_group)
            .service(search_groups)
            .service(group_status)
            .service(group_orders)
            .service(commit_to_group)
            .service(cancel_commitment)
            .service(buyer_commitments);
    }
}

#[actix_web::test]
async fn health_check() {
    let ctx = setup().await;
    let app = test::init_service(App::new().configure(configure(ctx.api.clone()))).await;
    let req = TestRequest::get().uri("/health").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "👍️\n".as_bytes());
    tear_down(ctx).await;
}

#[actix_web::test]
async fn full_commit_flow_over_http() {
    let ctx = setup().await;
    seed_product(&ctx, "veggie-box", 1_000, 100).await;
    let app = test::init_service(App::new().configure(configure(ctx.api.clone()))).await;

    let req = TestRequest::post().uri("/api/groups").set_json(group_body("veggie-box", 4, 2, 10)).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let group: serde_json::Value = test::read_body_json(res).await;
    let group_id = group["group_id"].as_i64().expect("group_id missing");
    assert_eq!(group["status"], "Open");
    // the geocoder derived the area from the postcode prefix
    assert_eq!(group["area"], "Berlin Moabit");

    let req = TestRequest::post()
        .uri(&format!("/api/groups/{group_id}/commitments"))
        .set_json(commit_body("alice", 2))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(outcome["group_completed"], false);
    assert_eq!(outcome["group"]["current_quantity"], 2);

    let req = TestRequest::post()
        .uri(&format!("/api/groups/{group_id}/commitments"))
        .set_json(commit_body("bob", 2))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: serde_json::Value = test::read_body_json(res).await;
    info!("🧪️ Final commit outcome: {outcome}");
    assert_eq!(outcome["group_completed"], true);

    let req = TestRequest::get().uri(&format!("/api/groups/{group_id}")).to_request();
    let snapshot: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(snapshot["status"], "Completed");
    assert_eq!(snapshot["current_quantity"], 4);

    let req = TestRequest::get().uri(&format!("/api/groups/{group_id}/orders")).to_request();
    let orders: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(orders.as_array().map(|a| a.len()), Some(2));
    assert_eq!(ctx.processor.count_in_state(SandboxHoldState::Captured), 2);
    tear_down(ctx).await;
}

#[actix_web::test]
async fn flow_errors_map_onto_status_codes() {
    let ctx = setup().await;
    seed_product(&ctx, "veggie-box", 1_000, 100).await;
    let app = test::init_service(App::new().configure(configure(ctx.api.clone()))).await;

    // Unknown group
    let req = TestRequest::post().uri("/api/groups/999/commitments").set_json(commit_body("alice", 1)).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "GROUP_NOT_FOUND");

    let req = TestRequest::post().uri("/api/groups").set_json(group_body("veggie-box", 10, 5, 10)).to_request();
    let group: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let group_id = group["group_id"].as_i64().expect("group_id missing");

    // Zero quantity
    let req = TestRequest::post()
        .uri(&format!("/api/groups/{group_id}/commitments"))
        .set_json(commit_body("alice", 0))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "INVALID_QUANTITY");

    // One pending commitment per buyer per group
    let req = TestRequest::post()
        .uri(&format!("/api/groups/{group_id}/commitments"))
        .set_json(commit_body("alice", 1))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let req = TestRequest::post()
        .uri(&format!("/api/groups/{group_id}/commitments"))
        .set_json(commit_body("alice", 1))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "DUPLICATE_COMMITMENT");

    // A declined hold travels back as 402
    ctx.processor.decline_next_authorization("insufficient funds");
    let req = TestRequest::post()
        .uri(&format!("/api/groups/{group_id}/commitments"))
        .set_json(commit_body("bob", 1))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "PAYMENT_DECLINED");
    tear_down(ctx).await;
}

#[actix_web::test]
async fn cancellation_over_http() {
    let ctx = setup().await;
    seed_product(&ctx, "veggie-box", 1_000, 100).await;
    let app = test::init_service(App::new().configure(configure(ctx.api.clone()))).await;

    let req = TestRequest::post().uri("/api/groups").set_json(group_body("veggie-box", 10, 5, 10)).to_request();
    let group: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let group_id = group["group_id"].as_i64().expect("group_id missing");

    let req = TestRequest::post()
        .uri(&format!("/api/groups/{group_id}/commitments"))
        .set_json(commit_body("alice", 3))
        .to_request();
    let outcome: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let commitment_id = outcome["commitment"]["id"].as_i64().expect("commitment id missing");

    // Only the owner may cancel
    let req = TestRequest::post()
        .uri(&format!("/api/commitments/{commitment_id}/cancel"))
        .set_json(serde_json::json!({ "buyer_id": "mallory" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "NOT_COMMITMENT_OWNER");

    let req = TestRequest::post()
        .uri(&format!("/api/commitments/{commitment_id}/cancel"))
        .set_json(serde_json::json!({ "buyer_id": "alice" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["group"]["current_quantity"], 0);
    assert_eq!(ctx.processor.count_in_state(SandboxHoldState::Released), 1);

    // The buyer's history still shows the cancelled commitment
    let req = TestRequest::get().uri("/api/buyers/alice/commitments").to_request();
    let history: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history.as_array().map(|a| a.len()), Some(1));
    assert_eq!(history[0]["status"], "Cancelled");
    tear_down(ctx).await;
}

#[actix_web::test]
async fn auth_issues_verifiable_tokens() {
    let ctx = setup().await;
    let app = test::init_service(App::new().configure(configure(ctx.api.clone()))).await;
    let req = TestRequest::post().uri("/auth").set_json(serde_json::json!({ "buyer_id": "alice" })).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    let token = body["token"].as_str().expect("token missing");
    let issuer = test_issuer();
    assert_eq!(issuer.verify(token).expect("token should verify"), "alice");
    tear_down(ctx).await;
}
