//! One running flow per wallet and target.
use alloy_primitives::Address;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Another flow already holds the (wallet, target) pair.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("a deploy flow for wallet {wallet} on {target} is already running")]
pub struct FlowBusy {
    pub wallet: Address,
    pub target: Address,
}

/// Admits at most one flow per (wallet, target) pair.
#[derive(Debug, Clone, Default)]
pub struct FlowCoordinator {
    active: Arc<Mutex<HashSet<(Address, Address)>>>,
}

impl FlowCoordinator {
    /// Coordinator with no running flows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the pair until the returned guard is dropped.
    pub fn try_acquire(&self, wallet: Address, target: Address) -> Result<FlowGuard, FlowBusy> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert((wallet, target)) {
            return Err(FlowBusy { wallet, target });
        }
        debug!(message = "Flow slot acquired", wallet = %wallet, target = %target);
        Ok(FlowGuard {
            active: Arc::clone(&self.active),
            key: (wallet, target),
        })
    }

    /// Whether a flow currently holds the pair.
    pub fn is_active(&self, wallet: Address, target: Address) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(wallet, target))
    }
}

/// Releases its (wallet, target) slot on drop.
#[derive(Debug)]
pub struct FlowGuard {
    active: Arc<Mutex<HashSet<(Address, Address)>>>,
    key: (Address, Address),
}

impl Drop for FlowGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
