//! Wear detection from the pulse sensor.
//!
//! A non-zero pulse reading means the device is on a wrist. Motion samples are
//! only analysed while worn; the engine discards any half-collected window
//! when the device comes off.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Default spacing between repeated status lines while the state is steady.
pub const DEFAULT_STATUS_INTERVAL_MS: u64 = 10_000;

/// Result of feeding one pulse reading into the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WearTransition {
    Unchanged,
    BecameWorn,
    BecameUnworn,
}

impl std::fmt::Display for WearTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::BecameWorn => write!(f, "became_worn"),
            Self::BecameUnworn => write!(f, "became_unworn"),
        }
    }
}

/// Pulse-derived worn flag. One writer (the pulse callback), any number of
/// readers on other threads.
#[derive(Debug)]
pub struct WearGate {
    worn: AtomicBool,
    last_report_ms: AtomicU64,
    status_interval_ms: u64,
}

impl Default for WearGate {
    fn default() -> Self {
        Self::new(false)
    }
}

impl WearGate {
    pub fn new(initially_worn: bool) -> Self {
        Self::with_status_interval(initially_worn, DEFAULT_STATUS_INTERVAL_MS)
    }

    pub fn with_status_interval(initially_worn: bool, status_interval_ms: u64) -> Self {
        Self {
            worn: AtomicBool::new(initially_worn),
            last_report_ms: AtomicU64::new(0),
            status_interval_ms,
        }
    }

    pub fn is_worn(&self) -> bool {
        self.worn.load(Ordering::SeqCst)
    }

    /// Back to unworn with no status line reported yet. A new monitoring
    /// session needs a fresh pulse before motion is analysed again.
    pub fn reset(&self) {
        self.worn.store(false, Ordering::SeqCst);
        self.last_report_ms.store(0, Ordering::Relaxed);
    }

    /// Update the worn flag from a pulse reading taken at `now_ms`.
    pub fn on_pulse_sample(&self, value: i32, now_ms: u64) -> WearTransition {
        let worn = value > 0;
        let was_worn = self.worn.swap(worn, Ordering::SeqCst);

        let transition = match (was_worn, worn) {
            (false, true) => WearTransition::BecameWorn,
            (true, false) => WearTransition::BecameUnworn,
            _ => WearTransition::Unchanged,
        };

        if self.report_due(transition, now_ms) {
            if worn {
                log::info!("pulse {value} bpm: device worn, fall detection active");
            } else {
                log::warn!("pulse 0 bpm: device not worn, fall detection disabled");
            }
        }

        transition
    }

    /// Status lines go out on every transition and at most once per interval
    /// otherwise.
    fn report_due(&self, transition: WearTransition, now_ms: u64) -> bool {
        let last = self.last_report_ms.load(Ordering::Relaxed);
        let due = transition != WearTransition::Unchanged
            || now_ms.saturating_sub(last) > self.status_interval_ms;
        if due {
            self.last_report_ms.store(now_ms, Ordering::Relaxed);
        }
        due
    }
}
