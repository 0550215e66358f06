//! Availability switch for the collection loop
//!
//! A cloneable handle over one shared flag. The collection loop reads it
//! before every cycle and the control API writes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AvailabilityToggle {
    active: Arc<AtomicBool>,
}

impl Default for AvailabilityToggle {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AvailabilityToggle {
    pub fn new(active: bool) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(active)),
        }
    }

    /// Switch collection on or off
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Whether the next scheduled cycle should run
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Interpret a control-endpoint value: `false` and `0` switch off,
    /// anything else switches on.
    pub fn parse_status(value: &str) -> bool {
        !matches!(value, "false" | "0")
    }
}
