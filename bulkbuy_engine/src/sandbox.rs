//! An in-memory payment processor.
//!
//! [`SandboxProcessor`] honors the full [`PaymentProcessor`] contract, including the
//! idempotency rules, without leaving the process. It backs the engine's test suite
//! and the server's sandbox mode, where holds should behave realistically but no
//! money may move. Failure injection hooks let tests exercise the decline and
//! capture-failure paths deterministically.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use bb_common::Money;
use log::debug;

use crate::traits::{HoldMetadata, PaymentProcessor, PaymentProcessorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxHoldState {
    Held,
    Captured,
    Released,
}

#[derive(Debug, Clone)]
pub struct SandboxHold {
    pub amount: Money,
    pub meta: HoldMetadata,
    pub state: SandboxHoldState,
}

#[derive(Debug, Default)]
struct SandboxState {
    holds: HashMap<String, SandboxHold>,
    decline_next: Option<String>,
    fail_next_capture: Option<String>,
}

#[derive(Clone, Default)]
pub struct SandboxProcessor {
    state: Arc<Mutex<SandboxState>>,
}

impl SandboxProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `authorize` call is declined with the given reason.
    pub fn decline_next_authorization<S: Into<String>>(&self, reason: S) {
        self.with_state(|s| s.decline_next = Some(reason.into()));
    }

    /// The next `capture` call fails with the given reason.
    pub fn fail_next_capture<S: Into<String>>(&self, reason: S) {
        self.with_state(|s| s.fail_next_capture = Some(reason.into()));
    }

    pub fn hold(&self, hold_ref: &str) -> Option<SandboxHold> {
        self.with_state(|s| s.holds.get(hold_ref).cloned())
    }

    pub fn count_in_state(&self, state: SandboxHoldState) -> usize {
        self.with_state(|s| s.holds.values().filter(|h| h.state == state).count())
    }

    pub fn hold_count(&self) -> usize {
        self.with_state(|s| s.holds.len())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SandboxState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut state)
    }
}

impl PaymentProcessor for SandboxProcessor {
    async fn authorize(&self, amount: Money, meta: &HoldMetadata) -> Result<String, PaymentProcessorError> {
        self.with_state(|s| {
            if let Some(reason) = s.decline_next.take() {
                return Err(PaymentProcessorError::Declined(reason));
            }
            let hold_ref = format!("sandbox-hold-{:016x}", rand::random::<u64>());
            debug!("🏝️ Sandbox hold {hold_ref} placed for {amount} ({} on group {})", meta.buyer_id, meta.group_id);
            s.holds.insert(
                hold_ref.clone(),
                SandboxHold { amount, meta: meta.clone(), state: SandboxHoldState::Held },
            );
            Ok(hold_ref)
        })
    }

    async fn capture(&self, hold_ref: &str) -> Result<(), PaymentProcessorError> {
        self.with_state(|s| {
            if let Some(reason) = s.fail_next_capture.take() {
                return Err(PaymentProcessorError::Unavailable(reason));
            }
            let hold = s
                .holds
                .get_mut(hold_ref)
                .ok_or_else(|| PaymentProcessorError::UnknownHold(hold_ref.to_string()))?;
            match hold.state {
                SandboxHoldState::Held | SandboxHoldState::Captured => {
                    hold.state = SandboxHoldState::Captured;
                    Ok(())
                },
                SandboxHoldState::Released => {
                    Err(PaymentProcessorError::Protocol(format!("hold {hold_ref} was already released")))
                },
            }
        })
    }

    async fn release(&self, hold_ref: &str) -> Result<(), PaymentProcessorError> {
        self.with_state(|s| {
            // Releasing an unknown hold succeeds, per the processor contract.
            let Some(hold) = s.holds.get_mut(hold_ref) else {
                debug!("🏝️ Sandbox release of unknown hold {hold_ref}. Ignoring.");
                return Ok(());
            };
            match hold.state {
                SandboxHoldState::Held | SandboxHoldState::Released => {
                    hold.state = SandboxHoldState::Released;
                    Ok(())
                },
                SandboxHoldState::Captured => {
                    Err(PaymentProcessorError::Protocol(format!("hold {hold_ref} was already captured")))
                },
            }
        })
    }
}
