use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Commitment, Coordinate, Group, GroupId, GroupStatus};

/// Filter for group searches. Empty fields are not constrained.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupQueryFilter {
    pub product_id: Option<String>,
    pub area: Option<String>,
    pub status: Option<Vec<GroupStatus>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl GroupQueryFilter {
    pub fn is_empty(&self) -> bool {
        self.product_id.is_none()
            && self.area.is_none()
            && self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true)
            && self.since.is_none()
            && self.until.is_none()
    }

    pub fn with_product_id<S: Into<String>>(mut self, product_id: S) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn with_area<S: Into<String>>(mut self, area: S) -> Self {
        self.area = Some(area.into());
        self
    }

    pub fn with_status(mut self, status: GroupStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }
}

/// A buyer's commit request, after the caller has resolved the postcode to a
/// location (geocoding happens outside the critical section).
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub group_id: GroupId,
    pub buyer_id: String,
    pub quantity: i64,
    pub postcode: String,
    pub location: Coordinate,
}

/// The result of a successful commit: the accepted commitment, the group as it stood
/// immediately after the increment, and the conversion outcome when this commit
/// crossed the target.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub commitment: Commitment,
    pub group: Group,
    pub conversion: Option<crate::traits::ConversionResult>,
}

impl CommitOutcome {
    pub fn reached_target(&self) -> bool {
        self.conversion.is_some()
    }
}

/// Point-in-time view of a group for status endpoints and the `subscribed` snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub group_id: GroupId,
    pub product_id: String,
    pub area: String,
    pub status: GroupStatus,
    pub current_quantity: i64,
    pub target_quantity: i64,
    pub min_quantity: i64,
    pub discount_percent: i64,
    pub percent: i64,
    pub expires_at: DateTime<Utc>,
}

impl From<&Group> for GroupSnapshot {
    fn from(g: &Group) -> Self {
        Self {
            group_id: g.id,
            product_id: g.product_id.clone(),
            area: g.area.clone(),
            status: g.status,
            current_quantity: g.current_quantity,
            target_quantity: g.target_quantity,
            min_quantity: g.min_quantity,
            discount_percent: g.discount_percent,
            percent: g.progress_percent(),
            expires_at: g.expires_at,
        }
    }
}
