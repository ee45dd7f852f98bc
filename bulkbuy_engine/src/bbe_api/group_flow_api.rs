use chrono::Utc;
use log::{debug, error, info, warn};
use std::{fmt::Debug, sync::Arc};

use crate::{
    bbe_api::{
        errors::GroupFlowError,
        group_objects::{CommitOutcome, CommitRequest},
        locks::GroupLocks,
    },
    db_types::{Commitment, CommitmentStatus, Group, GroupId, GroupStatus, NewCommitment, NewGroup},
    events::{
        CommitmentPayload, EventProducers, GroupEvent, GroupFinalizedEvent, ProgressPayload, StatusChangePayload,
        ThresholdPayload,
    },
    helpers::{discounted_total, haversine_km},
    traits::{ConversionResult, CoordinationDatabase, HoldMetadata, PaymentProcessor, PaymentProcessorError, SweepResult},
};

/// Tunables of the coordination state machine.
#[derive(Debug, Clone, Copy)]
pub struct CoordinationPolicy {
    /// Progress percentage at which a `threshold_reached` event fires, exactly once
    /// per group.
    pub threshold_percent: i64,
    /// VAT applied on top of the discounted subtotal.
    pub vat_percent: i64,
}

impl Default for CoordinationPolicy {
    fn default() -> Self {
        Self { threshold_percent: 80, vat_percent: 20 }
    }
}

/// A webhook notification about a hold, translated from the processor's wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldEventKind {
    Succeeded,
    Failed,
    Canceled,
}

/// `GroupFlowApi` is the primary API for coordinating buying groups.
///
/// It holds the database and the payment processor, and serializes every mutation of
/// a group behind that group's lock, so the counter, the ledger and the event log
/// always move together. Events are published to the configured producers only after
/// the state change is durable; WebSocket broadcasting and other hooks hang off
/// those producers.
pub struct GroupFlowApi<B, P> {
    db: B,
    processor: P,
    producers: EventProducers,
    locks: Arc<GroupLocks>,
    policy: CoordinationPolicy,
}

impl<B: Debug, P> Debug for GroupFlowApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GroupFlowApi ({:?})", self.db)
    }
}

impl<B, P> GroupFlowApi<B, P>
where
    B: CoordinationDatabase,
    P: PaymentProcessor,
{
    pub fn new(db: B, processor: P, producers: EventProducers) -> Self {
        Self { db, processor, producers, locks: Arc::new(GroupLocks::new()), policy: CoordinationPolicy::default() }
    }

    pub fn with_policy(mut self, policy: CoordinationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn policy(&self) -> CoordinationPolicy {
        self.policy
    }

    /// Creates a new group in `Open` status after validating its configuration.
    pub async fn create_group(&self, group: NewGroup) -> Result<Group, GroupFlowError> {
        if group.target_quantity < 1 {
            return Err(GroupFlowError::InvalidGroupConfig("target_quantity must be at least 1".into()));
        }
        if group.min_quantity < 1 || group.min_quantity > group.target_quantity {
            return Err(GroupFlowError::InvalidGroupConfig(
                "min_quantity must be between 1 and target_quantity".into(),
            ));
        }
        if !(0..=50).contains(&group.discount_percent) {
            return Err(GroupFlowError::InvalidGroupConfig("discount_percent must be between 0 and 50".into()));
        }
        if !group.radius_km.is_finite() || group.radius_km <= 0.0 {
            return Err(GroupFlowError::InvalidGroupConfig("radius_km must be positive".into()));
        }
        if group.expires_at <= Utc::now() {
            return Err(GroupFlowError::InvalidGroupConfig("expires_at must be in the future".into()));
        }
        let product = self
            .db
            .fetch_product(&group.product_id)
            .await?
            .ok_or_else(|| GroupFlowError::ProductNotFound(group.product_id.clone()))?;
        let created = self.db.insert_group(group).await?;
        info!("🛒 Group {} created for {} ({}) in {}", created.id, product.name, created.product_id, created.area);
        Ok(created)
    }

    /// Submits a new commitment to a group. This is the write path of the whole
    /// engine: validation, pricing, the payment hold and the ledger append all
    /// happen under the group's lock, in that order. When the commit crosses the
    /// target, the group activates in the same transaction and is converted to
    /// fulfilment orders before this method returns.
    ///
    /// A failure at any step leaves no trace in the ledger. In particular, a
    /// declined hold aborts before anything is written.
    pub async fn commit_to_group(&self, req: CommitRequest) -> Result<CommitOutcome, GroupFlowError> {
        if req.quantity < 1 {
            return Err(GroupFlowError::InvalidQuantity);
        }
        let guard = self.locks.lock(req.group_id).await;
        let result = self.commit_locked(&req).await;
        drop(guard);
        let (commitment, group, events) = result?;
        info!(
            "🛒 Buyer {} committed {} unit(s) to group {} ({} / {})",
            commitment.buyer_id, commitment.quantity, group.id, group.current_quantity, group.target_quantity
        );
        self.publish_group_events(events).await;
        let conversion = if group.status == GroupStatus::Active {
            info!("🎯 Group {} reached its target with this commitment. Converting now.", group.id);
            Some(self.convert_active_group(&group).await?)
        } else {
            None
        };
        Ok(CommitOutcome { commitment, group, conversion })
    }

    async fn commit_locked(&self, req: &CommitRequest) -> Result<(Commitment, Group, Vec<GroupEvent>), GroupFlowError> {
        let group =
            self.db.fetch_group(req.group_id).await?.ok_or(GroupFlowError::GroupNotFound(req.group_id))?;
        if !group.status.is_open() {
            return Err(GroupFlowError::GroupClosed(group.status));
        }
        // The sweeper may not have run yet; an expired group rejects commits
        // regardless.
        if group.has_expired(Utc::now()) {
            return Err(GroupFlowError::GroupExpired);
        }
        if self.db.pending_commitment_for(req.group_id, &req.buyer_id).await?.is_some() {
            return Err(GroupFlowError::DuplicateCommitment);
        }
        let product = self
            .db
            .fetch_product(&group.product_id)
            .await?
            .ok_or_else(|| GroupFlowError::ProductNotFound(group.product_id.clone()))?;
        if group.current_quantity + req.quantity > product.available_stock {
            return Err(GroupFlowError::ExceedsStock { available: product.available_stock - group.current_quantity });
        }
        let distance_km = haversine_km(group.center(), req.location);
        if distance_km > group.radius_km {
            return Err(GroupFlowError::OutsideRadius { distance_km, radius_km: group.radius_km });
        }
        let price = discounted_total(product.unit_price, req.quantity, group.discount_percent, self.policy.vat_percent);
        debug!(
            "💰 Pricing for buyer {} on group {}: {} x {} = {} (incl. {}% VAT)",
            req.buyer_id, group.id, req.quantity, price.unit_price, price.total, self.policy.vat_percent
        );
        let meta = HoldMetadata { group_id: group.id, buyer_id: req.buyer_id.clone(), quantity: req.quantity };
        let hold_ref = self.processor.authorize(price.total, &meta).await.map_err(|e| match e {
            PaymentProcessorError::Declined(msg) => GroupFlowError::PaymentDeclined(msg),
            other => GroupFlowError::ProcessorUnavailable(other.to_string()),
        })?;
        debug!("💳 Hold {hold_ref} placed for buyer {} on group {}", req.buyer_id, group.id);
        let new_commitment = NewCommitment {
            group_id: group.id,
            buyer_id: req.buyer_id.clone(),
            quantity: req.quantity,
            unit_price: price.unit_price,
            total_price: price.total,
            postcode: req.postcode.clone(),
            location: req.location,
            hold_ref: Some(hold_ref),
        };
        let activate = group.current_quantity + req.quantity >= group.target_quantity;
        let before_pct = group.progress_percent();
        let (commitment, group_after) = self.db.record_commitment(new_commitment, activate).await?;
        let mut events = vec![
            GroupEvent::NewCommitment(CommitmentPayload {
                group_id: group_after.id,
                commitment_id: commitment.id,
                buyer_id: commitment.buyer_id.clone(),
                quantity: commitment.quantity,
                current_quantity: group_after.current_quantity,
            }),
            progress_event(&group_after),
        ];
        if before_pct < self.policy.threshold_percent && group_after.progress_percent() >= self.policy.threshold_percent
        {
            events.push(GroupEvent::ThresholdReached(ThresholdPayload {
                group_id: group_after.id,
                threshold_percent: self.policy.threshold_percent,
                current_quantity: group_after.current_quantity,
                target_quantity: group_after.target_quantity,
            }));
        }
        if activate {
            events.push(GroupEvent::StatusChange(StatusChangePayload {
                group_id: group_after.id,
                old_status: GroupStatus::Open,
                new_status: GroupStatus::Active,
            }));
        }
        self.db.append_events(&events).await?;
        Ok((commitment, group_after, events))
    }

    /// Withdraws a pending commitment from a still-open group: the hold is released,
    /// the counter decremented, and the freed capacity immediately available.
    ///
    /// A transient release failure does not block the withdrawal; the ledger is
    /// authoritative and the orphaned hold expires upstream or is reconciled via the
    /// webhook.
    pub async fn cancel_commitment(&self, commitment_id: i64, buyer_id: &str) -> Result<CommitOutcome, GroupFlowError> {
        let existing =
            self.db.fetch_commitment(commitment_id).await?.ok_or(GroupFlowError::CommitmentNotFound(commitment_id))?;
        if existing.buyer_id != buyer_id {
            return Err(GroupFlowError::NotCommitmentOwner);
        }
        let guard = self.locks.lock(existing.group_id).await;
        let result = self.cancel_locked(commitment_id).await;
        drop(guard);
        let (commitment, group, events) = result?;
        info!(
            "↩️ Buyer {} withdrew commitment {} from group {} ({} / {})",
            commitment.buyer_id, commitment.id, group.id, group.current_quantity, group.target_quantity
        );
        self.publish_group_events(events).await;
        Ok(CommitOutcome { commitment, group, conversion: None })
    }

    async fn cancel_locked(&self, commitment_id: i64) -> Result<(Commitment, Group, Vec<GroupEvent>), GroupFlowError> {
        // Re-fetch under the lock; a sweep or conversion may have raced us.
        let commitment =
            self.db.fetch_commitment(commitment_id).await?.ok_or(GroupFlowError::CommitmentNotFound(commitment_id))?;
        if commitment.status != CommitmentStatus::Pending {
            return Err(GroupFlowError::CommitmentNotPending);
        }
        let group =
            self.db.fetch_group(commitment.group_id).await?.ok_or(GroupFlowError::GroupNotFound(commitment.group_id))?;
        if !group.status.is_open() {
            return Err(GroupFlowError::GroupClosed(group.status));
        }
        if let Some(hold_ref) = &commitment.hold_ref {
            if let Err(e) = self.processor.release(hold_ref).await {
                warn!("⚠️ Could not release hold {hold_ref} for commitment {commitment_id}: {e}. Continuing anyway.");
            }
        }
        let (cancelled, group_after) = self.db.cancel_commitment(commitment_id).await?;
        let events = vec![
            GroupEvent::CommitmentCancelled(CommitmentPayload {
                group_id: group_after.id,
                commitment_id: cancelled.id,
                buyer_id: cancelled.buyer_id.clone(),
                quantity: cancelled.quantity,
                current_quantity: group_after.current_quantity,
            }),
            progress_event(&group_after),
        ];
        self.db.append_events(&events).await?;
        Ok((cancelled, group_after, events))
    }

    /// One pass of the expiration sweeper. Each expired open group is finalized
    /// independently: met its minimum, it activates and converts; below it, every
    /// pending commitment is voided and its hold released. One group's failure never
    /// aborts the pass.
    pub async fn sweep_expired_groups(&self) -> Result<SweepResult, GroupFlowError> {
        let now = Utc::now();
        let candidates = self.db.expired_open_groups(now).await?;
        if candidates.is_empty() {
            debug!("⏰ Sweep: no expired open groups");
            return Ok(SweepResult::default());
        }
        info!("⏰ Sweep: {} expired open group(s) to finalize", candidates.len());
        let mut result = SweepResult::default();
        for group in candidates {
            match self.finalize_expired_group(group.id).await {
                Ok(Some(FinalizedGroup::Completed(conversion))) => result.completed.push(conversion),
                Ok(Some(FinalizedGroup::Failed(id, voided))) => result.failed.push((id, voided)),
                Ok(None) => {},
                Err(e) => error!("⏰ Sweep could not finalize group {}: {e}", group.id),
            }
        }
        info!("⏰ Sweep done. {} completed, {} failed.", result.completed_count(), result.failed_count());
        Ok(result)
    }

    async fn finalize_expired_group(&self, group_id: GroupId) -> Result<Option<FinalizedGroup>, GroupFlowError> {
        let guard = self.locks.lock(group_id).await;
        let group = self.db.fetch_group(group_id).await?.ok_or(GroupFlowError::GroupNotFound(group_id))?;
        // A concurrent commit may have activated the group between the candidate
        // query and here.
        if !group.status.is_open() || !group.has_expired(Utc::now()) {
            drop(guard);
            return Ok(None);
        }
        if group.current_quantity >= group.min_quantity {
            info!(
                "⏰ Group {} expired at {} / {} (minimum {}). Converting.",
                group.id, group.current_quantity, group.target_quantity, group.min_quantity
            );
            let active = self.db.update_group_status(group_id, GroupStatus::Active).await?;
            let events = vec![GroupEvent::StatusChange(StatusChangePayload {
                group_id,
                old_status: GroupStatus::Open,
                new_status: GroupStatus::Active,
            })];
            self.db.append_events(&events).await?;
            drop(guard);
            self.publish_group_events(events).await;
            let conversion = self.convert_active_group(&active).await?;
            Ok(Some(FinalizedGroup::Completed(conversion)))
        } else {
            info!(
                "⏰ Group {} expired at {} / {} below minimum {}. Failing it.",
                group.id, group.current_quantity, group.target_quantity, group.min_quantity
            );
            let pending = self.db.fetch_pending_commitments(group_id).await?;
            for commitment in &pending {
                if let Some(hold_ref) = &commitment.hold_ref {
                    if let Err(e) = self.processor.release(hold_ref).await {
                        warn!("⚠️ Could not release hold {hold_ref} of failed group {group_id}: {e}");
                    }
                }
            }
            let voided = self.db.void_pending_commitments(group_id).await?;
            let failed = self.db.update_group_status(group_id, GroupStatus::Failed).await?;
            let mut events = vec![GroupEvent::StatusChange(StatusChangePayload {
                group_id,
                old_status: GroupStatus::Open,
                new_status: GroupStatus::Failed,
            })];
            for commitment in &voided {
                events.push(GroupEvent::CommitmentCancelled(CommitmentPayload {
                    group_id,
                    commitment_id: commitment.id,
                    buyer_id: commitment.buyer_id.clone(),
                    quantity: commitment.quantity,
                    // The counter freezes once the group leaves Open.
                    current_quantity: failed.current_quantity,
                }));
            }
            self.db.append_events(&events).await?;
            drop(guard);
            self.publish_group_events(events).await;
            self.publish_finalized(GroupFinalizedEvent {
                group_id,
                status: GroupStatus::Failed,
                current_quantity: failed.current_quantity,
                orders_created: 0,
                orders_failed: 0,
            })
            .await;
            Ok(Some(FinalizedGroup::Failed(group_id, voided.len())))
        }
    }

    /// Converts an `Active` group: captures each pending hold and confirms the
    /// commitment into a fulfilment order, then completes the group. Per-commitment
    /// failures are collected, not fatal.
    ///
    /// No lock is needed here. `Active` status already rejects commits and cancels,
    /// and the sweeper skips non-open groups.
    async fn convert_active_group(&self, group: &Group) -> Result<ConversionResult, GroupFlowError> {
        let pending = self.db.fetch_pending_commitments(group.id).await?;
        let mut result = ConversionResult::new(group.id);
        for commitment in pending {
            match self.capture_and_confirm(&commitment).await {
                Ok(order) => {
                    debug!("📦 Order {} created for commitment {} on group {}", order.id, commitment.id, group.id);
                    result.orders.push(order);
                },
                Err(e) => {
                    error!(
                        "📦 Capture failed for commitment {} on group {}: {e}. Leaving it for remediation.",
                        commitment.id, group.id
                    );
                    result.failed.push(commitment.id);
                },
            }
        }
        let completed = self.db.update_group_status(group.id, GroupStatus::Completed).await?;
        let events = vec![
            GroupEvent::StatusChange(StatusChangePayload {
                group_id: group.id,
                old_status: GroupStatus::Active,
                new_status: GroupStatus::Completed,
            }),
            progress_event(&completed),
        ];
        self.db.append_events(&events).await?;
        info!(
            "📦 Group {} completed. {} order(s) created, {} capture failure(s).",
            group.id,
            result.created_count(),
            result.failed_count()
        );
        self.publish_group_events(events).await;
        self.publish_finalized(GroupFinalizedEvent {
            group_id: group.id,
            status: GroupStatus::Completed,
            current_quantity: completed.current_quantity,
            orders_created: result.created_count(),
            orders_failed: result.failed_count(),
        })
        .await;
        Ok(result)
    }

    async fn capture_and_confirm(&self, commitment: &Commitment) -> Result<crate::db_types::FulfilmentOrder, GroupFlowError> {
        if let Some(hold_ref) = &commitment.hold_ref {
            self.processor.capture(hold_ref).await.map_err(|e| match e {
                PaymentProcessorError::Declined(msg) => GroupFlowError::PaymentDeclined(msg),
                other => GroupFlowError::ProcessorUnavailable(other.to_string()),
            })?;
        }
        let (_confirmed, order) = self.db.confirm_commitment(commitment.id).await?;
        Ok(order)
    }

    /// Applies a processor webhook notification about a hold. Unknown references are
    /// ignored; the webhook endpoint acknowledges regardless, so the processor never
    /// retries into an error loop.
    pub async fn apply_hold_update(&self, hold_ref: &str, kind: HoldEventKind) -> Result<(), GroupFlowError> {
        let Some(commitment) = self.db.commitment_by_hold_ref(hold_ref).await? else {
            info!("💳 Webhook for unknown hold {hold_ref}. Nothing to apply.");
            return Ok(());
        };
        match kind {
            HoldEventKind::Succeeded => {
                debug!("💳 Hold {hold_ref} confirmed upstream for commitment {}", commitment.id);
                Ok(())
            },
            HoldEventKind::Canceled => {
                debug!("💳 Hold {hold_ref} cancellation confirmed for commitment {}", commitment.id);
                self.db.mark_hold_released(commitment.id).await?;
                Ok(())
            },
            HoldEventKind::Failed => self.apply_hold_failure(commitment.id, hold_ref).await,
        }
    }

    /// A hold evaporated upstream: the pending commitment no longer has funds behind
    /// it and is withdrawn on the buyer's behalf while the group is still open. Once
    /// the group has left `Open` the counter is frozen, so we only record the hold
    /// state and leave the commitment for remediation.
    async fn apply_hold_failure(&self, commitment_id: i64, hold_ref: &str) -> Result<(), GroupFlowError> {
        let Some(probe) = self.db.fetch_commitment(commitment_id).await? else {
            return Ok(());
        };
        let guard = self.locks.lock(probe.group_id).await;
        let Some(commitment) = self.db.fetch_commitment(commitment_id).await? else {
            return Ok(());
        };
        if commitment.status != CommitmentStatus::Pending {
            debug!("💳 Hold {hold_ref} failed but commitment {commitment_id} is already {}", commitment.status);
            return Ok(());
        }
        let group =
            self.db.fetch_group(commitment.group_id).await?.ok_or(GroupFlowError::GroupNotFound(commitment.group_id))?;
        if group.status.is_open() {
            warn!("💳 Hold {hold_ref} failed upstream. Withdrawing commitment {commitment_id} from group {}", group.id);
            let (cancelled, group_after) = self.db.cancel_commitment(commitment_id).await?;
            let events = vec![
                GroupEvent::CommitmentCancelled(CommitmentPayload {
                    group_id: group_after.id,
                    commitment_id: cancelled.id,
                    buyer_id: cancelled.buyer_id.clone(),
                    quantity: cancelled.quantity,
                    current_quantity: group_after.current_quantity,
                }),
                progress_event(&group_after),
            ];
            self.db.append_events(&events).await?;
            drop(guard);
            self.publish_group_events(events).await;
        } else {
            warn!(
                "💳 Hold {hold_ref} failed upstream but group {} is {}. Recording the release only.",
                group.id, group.status
            );
            self.db.mark_hold_released(commitment_id).await?;
            drop(guard);
        }
        Ok(())
    }

    async fn publish_group_events(&self, events: Vec<GroupEvent>) {
        for event in events {
            for producer in &self.producers.group_event_producer {
                producer.publish_event(event.clone()).await;
            }
        }
    }

    async fn publish_finalized(&self, event: GroupFinalizedEvent) {
        for producer in &self.producers.group_finalized_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

enum FinalizedGroup {
    Completed(ConversionResult),
    Failed(GroupId, usize),
}

fn progress_event(group: &Group) -> GroupEvent {
    GroupEvent::ProgressUpdate(ProgressPayload {
        group_id: group.id,
        current_quantity: group.current_quantity,
        target_quantity: group.target_quantity,
        min_quantity: group.min_quantity,
        percent: group.progress_percent(),
        status: group.status,
    })
}
