use std::sync::Arc;

use bulkbuy_engine::{db_types::GroupId, traits::ConversionResult, GroupFlowApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::ServerProcessor;

/// Starts the group expiration sweeper. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// The sweeper shares the server's flow API instance so that finalization takes the
/// same per-group locks every commit and cancel takes.
pub fn start_sweeper(api: Arc<GroupFlowApi<SqliteDatabase, ServerProcessor>>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        info!("🕰️ Group expiration sweeper started (every {interval_secs}s)");
        loop {
            timer.tick().await;
            debug!("🕰️ Running group expiration sweep");
            match api.sweep_expired_groups().await {
                Ok(result) => {
                    if result.total_count() > 0 {
                        info!(
                            "🕰️ Sweep finalized {} groups ({} completed, {} failed)",
                            result.total_count(),
                            result.completed_count(),
                            result.failed_count()
                        );
                        debug!("🕰️ Completed: {}", conversion_list(&result.completed));
                        debug!("🕰️ Failed: {}", failure_list(&result.failed));
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running group expiration sweep: {e}");
                },
            }
        }
    })
}

fn conversion_list(conversions: &[ConversionResult]) -> String {
    conversions
        .iter()
        .map(|c| format!("{}: {} orders, {} capture failures", c.group_id, c.created_count(), c.failed_count()))
        .collect::<Vec<String>>()
        .join(", ")
}

fn failure_list(failures: &[(GroupId, usize)]) -> String {
    failures
        .iter()
        .map(|(id, voided)| format!("{id}: {voided} commitments voided"))
        .collect::<Vec<String>>()
        .join(", ")
}
