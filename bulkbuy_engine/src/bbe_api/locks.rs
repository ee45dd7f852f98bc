//! Per-group exclusive locks.
//!
//! All mutations of one group's counter and status serialize on its lock; unrelated
//! groups proceed independently. This replaces the row-level `SELECT ... FOR UPDATE`
//! a relational backend would use.

use std::{collections::HashMap, sync::Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::db_types::GroupId;

use std::sync::Arc;

#[derive(Default)]
pub struct GroupLocks {
    locks: Mutex<HashMap<GroupId, Arc<AsyncMutex<()>>>>,
}

impl GroupLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the exclusive lock for `group_id`, waiting if another commit, cancel
    /// or sweep currently holds it. The guard releases on drop.
    ///
    /// Lock entries are never evicted; a finalized group's mutex is a few dozen idle
    /// bytes and groups are retained as audit trail anyway.
    pub async fn lock(&self, group_id: GroupId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.locks.lock().expect("group lock registry poisoned");
            Arc::clone(map.entry(group_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
        };
        mutex.lock_owned().await
    }
}
