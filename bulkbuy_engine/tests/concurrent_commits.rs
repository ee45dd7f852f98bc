//! Concurrency test: simultaneous commits to one group must serialize cleanly, the
//! counter must never overshoot, and exactly one commit may trigger conversion.
use std::sync::Arc;

use bulkbuy_engine::{
    db_types::GroupStatus,
    traits::{CoordinationDatabase, GroupManagement},
};
use futures_util::future::join_all;

mod support;

use support::fixtures::{commit_req, new_group, seed_product, setup, tear_down};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_commits_serialize_on_the_group() {
    let (api, processor) = setup().await;
    seed_product(&api, "olive-oil-5l", 4500, 100).await;
    let group = api.create_group(new_group("olive-oil-5l", 20, 10, 15)).await.unwrap();
    let api = Arc::new(api);

    // Twelve buyers race for a 20-unit target in 2-unit commitments. Ten fit; the
    // last two must be turned away because the group closes the moment it fills.
    let tasks = (0..12).map(|i| {
        let api = Arc::clone(&api);
        let req = commit_req(group.id, &format!("buyer-{i}"), 2);
        tokio::spawn(async move { api.commit_to_group(req).await })
    });
    let outcomes: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    let successes: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    let failures: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(successes.len(), 10);
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|e| e.code() == "GROUP_CLOSED"));

    // Exactly one commit observed the crossing and ran the conversion.
    let conversions: Vec<_> = successes.iter().filter(|o| o.conversion.is_some()).collect();
    assert_eq!(conversions.len(), 1);
    assert_eq!(conversions[0].conversion.as_ref().unwrap().created_count(), 10);

    let final_group = api.db().fetch_group(group.id).await.unwrap().unwrap();
    assert_eq!(final_group.status, GroupStatus::Completed);
    assert_eq!(final_group.current_quantity, 20, "the counter never overshoots the target");

    let orders = api.db().fetch_orders_for_group(group.id).await.unwrap();
    assert_eq!(orders.len(), 10);
    assert_eq!(orders.iter().map(|o| o.quantity).sum::<i64>(), 20);
    // Turned-away buyers never reached the processor.
    assert_eq!(processor.hold_count(), 10);

    let api = Arc::into_inner(api).unwrap();
    tear_down(api).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_duplicates_from_one_buyer_leave_a_single_commitment() {
    let (api, _processor) = setup().await;
    seed_product(&api, "flour-25kg", 1800, 100).await;
    let group = api.create_group(new_group("flour-25kg", 40, 10, 10)).await.unwrap();
    let api = Arc::new(api);

    let tasks = (0..5).map(|_| {
        let api = Arc::clone(&api);
        let req = commit_req(group.id, "alice", 3);
        tokio::spawn(async move { api.commit_to_group(req).await })
    });
    let outcomes: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.code() == "DUPLICATE_COMMITMENT"));

    let final_group = api.db().fetch_group(group.id).await.unwrap().unwrap();
    assert_eq!(final_group.current_quantity, 3);
    assert_eq!(api.db().fetch_commitments_for_group(group.id).await.unwrap().len(), 1);

    let api = Arc::into_inner(api).unwrap();
    tear_down(api).await;
}
