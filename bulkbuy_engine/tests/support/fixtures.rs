use bb_common::Money;
use bulkbuy_engine::{
    db_types::{Coordinate, Group, GroupId, NewGroup, NewProduct, Product},
    events::EventProducers,
    CommitRequest,
    GroupFlowApi,
    SandboxProcessor,
    SqliteDatabase,
};
use chrono::{Duration, Utc};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use bulkbuy_engine::test_utils::prepare_env::{prepare_test_env, random_db_path};

pub type TestApi = GroupFlowApi<SqliteDatabase, SandboxProcessor>;

/// Rosenthaler Platz, Berlin. All test groups center here.
pub const CENTER: Coordinate = Coordinate { lat: 52.5298, lon: 13.4013 };
/// About 1.5 km from [`CENTER`].
pub const NEARBY: Coordinate = Coordinate { lat: 52.5396, lon: 13.4127 };
/// Potsdam, about 30 km out.
pub const FAR_AWAY: Coordinate = Coordinate { lat: 52.4009, lon: 13.0591 };

pub async fn setup_with_producers(producers: EventProducers) -> (TestApi, SandboxProcessor) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let processor = SandboxProcessor::new();
    let api = GroupFlowApi::new(db, processor.clone(), producers);
    (api, processor)
}

pub async fn setup() -> (TestApi, SandboxProcessor) {
    setup_with_producers(EventProducers::default()).await
}

pub async fn tear_down(mut api: TestApi) {
    use bulkbuy_engine::traits::CoordinationDatabase;
    let url = api.db().url().to_string();
    if let Err(e) = api.db_mut().close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
}

pub async fn seed_product(api: &TestApi, id: &str, unit_price_cents: i64, stock: i64) -> Product {
    use bulkbuy_engine::traits::CoordinationDatabase;
    let product = NewProduct {
        id: id.to_string(),
        name: format!("Test product {id}"),
        unit_price: Money::from_cents(unit_price_cents),
        available_stock: stock,
    };
    api.db().upsert_product(product).await.expect("Error seeding product")
}

pub fn new_group(product_id: &str, target: i64, min: i64, discount: i64) -> NewGroup {
    NewGroup {
        product_id: product_id.to_string(),
        area: "Berlin Mitte".to_string(),
        center: CENTER,
        radius_km: 10.0,
        target_quantity: target,
        min_quantity: min,
        discount_percent: discount,
        expires_at: Utc::now() + Duration::hours(1),
    }
}

/// Inserts a group that is already past its deadline, bypassing the create-time
/// validation. Whatever commitments exist were made "before" the deadline.
pub async fn insert_expired_group(api: &TestApi, product_id: &str, target: i64, min: i64) -> Group {
    use bulkbuy_engine::traits::CoordinationDatabase;
    let mut group = new_group(product_id, target, min, 10);
    group.expires_at = Utc::now() - Duration::minutes(5);
    api.db().insert_group(group).await.expect("Error inserting expired group")
}

/// Rewinds a group's deadline so the sweeper sees it as expired, leaving its
/// commitments in place.
pub async fn force_expire(api: &TestApi, group_id: GroupId) {
    sqlx::query("UPDATE buying_groups SET expires_at = datetime('now', '-5 minutes') WHERE id = $1")
        .bind(group_id.value())
        .execute(api.db().pool())
        .await
        .expect("Error rewinding group deadline");
}

pub fn commit_req(group_id: GroupId, buyer: &str, quantity: i64) -> CommitRequest {
    CommitRequest {
        group_id,
        buyer_id: buyer.to_string(),
        quantity,
        postcode: "10435".to_string(),
        location: NEARBY,
    }
}
