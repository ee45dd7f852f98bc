//! Tests of the expiration sweeper: deterministic success and failure outcomes for
//! groups whose deadline has passed.
use bulkbuy_engine::{
    db_types::{CommitmentStatus, GroupStatus, HoldStatus},
    traits::{CoordinationDatabase, GroupManagement},
    SandboxHoldState,
};

mod support;

use support::fixtures::{commit_req, force_expire, new_group, seed_product, setup, tear_down};

#[tokio::test]
async fn sweep_completes_groups_that_met_their_minimum() {
    let (api, processor) = setup().await;
    seed_product(&api, "olive-oil-5l", 4500, 100).await;
    let group = api.create_group(new_group("olive-oil-5l", 20, 10, 15)).await.unwrap();

    // 13 of 20 committed: short of the target but above the minimum of 10.
    api.commit_to_group(commit_req(group.id, "alice", 7)).await.unwrap();
    api.commit_to_group(commit_req(group.id, "bob", 6)).await.unwrap();
    force_expire(&api, group.id).await;

    let result = api.sweep_expired_groups().await.unwrap();
    assert_eq!(result.completed_count(), 1);
    assert_eq!(result.failed_count(), 0);
    assert_eq!(result.completed[0].created_count(), 2);

    let group = api.db().fetch_group(group.id).await.unwrap().unwrap();
    assert_eq!(group.status, GroupStatus::Completed);
    assert_eq!(group.current_quantity, 13);
    assert_eq!(processor.count_in_state(SandboxHoldState::Captured), 2);

    let orders = api.db().fetch_orders_for_group(group.id).await.unwrap();
    assert_eq!(orders.iter().map(|o| o.quantity).sum::<i64>(), 13);
    tear_down(api).await;
}

#[tokio::test]
async fn sweep_fails_groups_below_their_minimum() {
    let (api, processor) = setup().await;
    seed_product(&api, "flour-25kg", 1800, 100).await;
    let group = api.create_group(new_group("flour-25kg", 20, 10, 10)).await.unwrap();

    api.commit_to_group(commit_req(group.id, "alice", 3)).await.unwrap();
    api.commit_to_group(commit_req(group.id, "bob", 2)).await.unwrap();
    force_expire(&api, group.id).await;

    let result = api.sweep_expired_groups().await.unwrap();
    assert_eq!(result.completed_count(), 0);
    assert_eq!(result.failed, vec![(group.id, 2)]);

    let group = api.db().fetch_group(group.id).await.unwrap().unwrap();
    assert_eq!(group.status, GroupStatus::Failed);
    // The counter freezes at its final value as audit trail.
    assert_eq!(group.current_quantity, 5);

    let commitments = api.db().fetch_commitments_for_group(group.id).await.unwrap();
    assert!(commitments.iter().all(|c| c.status == CommitmentStatus::Cancelled));
    assert!(commitments.iter().all(|c| c.hold_status == HoldStatus::Released));
    assert_eq!(processor.count_in_state(SandboxHoldState::Released), 2);
    assert!(api.db().fetch_orders_for_group(group.id).await.unwrap().is_empty());
    tear_down(api).await;
}

#[tokio::test]
async fn sweep_is_idempotent_and_ignores_live_groups() {
    let (api, _processor) = setup().await;
    seed_product(&api, "coffee-1kg", 2400, 100).await;
    let expired = api.create_group(new_group("coffee-1kg", 20, 10, 10)).await.unwrap();
    let live = api.create_group(new_group("coffee-1kg", 20, 10, 10)).await.unwrap();

    api.commit_to_group(commit_req(expired.id, "alice", 12)).await.unwrap();
    api.commit_to_group(commit_req(live.id, "bob", 12)).await.unwrap();
    force_expire(&api, expired.id).await;

    let result = api.sweep_expired_groups().await.unwrap();
    assert_eq!(result.total_count(), 1);
    assert_eq!(result.completed[0].group_id, expired.id);

    // Nothing left to do on the second pass.
    let result = api.sweep_expired_groups().await.unwrap();
    assert_eq!(result.total_count(), 0);

    let live = api.db().fetch_group(live.id).await.unwrap().unwrap();
    assert_eq!(live.status, GroupStatus::Open);
    tear_down(api).await;
}

#[tokio::test]
async fn capture_failures_do_not_block_the_rest_of_the_group() {
    let (api, processor) = setup().await;
    seed_product(&api, "rice-10kg", 2100, 100).await;
    let group = api.create_group(new_group("rice-10kg", 20, 10, 10)).await.unwrap();

    api.commit_to_group(commit_req(group.id, "alice", 6)).await.unwrap();
    api.commit_to_group(commit_req(group.id, "bob", 6)).await.unwrap();
    force_expire(&api, group.id).await;

    // The first capture of the conversion pass fails; the second must still land.
    processor.fail_next_capture("upstream timeout");
    let result = api.sweep_expired_groups().await.unwrap();
    assert_eq!(result.completed_count(), 1);
    let conversion = &result.completed[0];
    assert_eq!(conversion.created_count(), 1);
    assert_eq!(conversion.failed_count(), 1);

    let group = api.db().fetch_group(group.id).await.unwrap().unwrap();
    assert_eq!(group.status, GroupStatus::Completed);
    // The failed commitment stays pending for remediation.
    let commitments = api.db().fetch_commitments_for_group(group.id).await.unwrap();
    assert_eq!(commitments.iter().filter(|c| c.status == CommitmentStatus::Pending).count(), 1);
    assert_eq!(commitments.iter().filter(|c| c.status == CommitmentStatus::Confirmed).count(), 1);
    tear_down(api).await;
}
