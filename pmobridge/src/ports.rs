//! Endpoint port allocation.

use std::collections::BTreeSet;

use crate::errors::BridgeError;

pub const DEFAULT_BASE_PORT: u16 = 22555;

/// Ports held by live endpoints.
///
/// Allocation returns the smallest free port at or above the base, so a
/// released port is handed out again before any higher one.
#[derive(Debug, Clone)]
pub struct PortPool {
    base: u16,
    used: BTreeSet<u16>,
}

impl PortPool {
    pub fn new(base: u16) -> Self {
        Self {
            base,
            used: BTreeSet::new(),
        }
    }

    pub fn allocate(&mut self) -> Result<u16, BridgeError> {
        let mut candidate = self.base;
        // `used` is sorted: walk it once from the base.
        for &port in self.used.range(self.base..) {
            if port != candidate {
                break;
            }
            candidate = candidate
                .checked_add(1)
                .ok_or(BridgeError::NoFreePort(self.base))?;
        }
        self.used.insert(candidate);
        Ok(candidate)
    }

    /// Returns `port` to the pool; `false` if it was not allocated.
    pub fn release(&mut self, port: u16) -> bool {
        self.used.remove(&port)
    }

    pub fn is_used(&self, port: u16) -> bool {
        self.used.contains(&port)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

impl Default for PortPool {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PORT)
    }
}
