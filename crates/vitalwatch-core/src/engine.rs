//! Motion window engine: rolling history, sustained-threshold detection and
//! pre/post-event window capture.
//!
//! Architecture:
//! 1. Every worn-state accelerometer tick enters [`MotionEngine::on_motion_sample`]
//! 2. The accelerometer magnitude feeds a consecutive-high counter
//! 3. A sustained run opens a capture seeded with the triggering sample
//! 4. Once the capture holds `post_threshold_size` samples it is spliced
//!    behind the history that preceded the trigger and emitted once
//! 5. History keeps flowing through all of the above
//!
//! All engine state sits behind one mutex and every public method is a
//! single critical section, so sensor callbacks on different threads never
//! observe a half-applied update.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use uuid::Uuid;

use crate::config::DetectionConfig;
use crate::error::Result;
use crate::history::HistoryBuffer;
use crate::sample::MotionSample;
use crate::wear::{WearGate, WearTransition};

/// A completed capture window ready for fall confirmation.
#[derive(Debug, Clone)]
pub struct DetectionEvent {
    pub id: Uuid,
    /// 1-based count of events emitted by this engine.
    pub sequence: u64,
    /// Pre-trigger history followed by the post-trigger capture,
    /// chronological.
    pub window: Vec<MotionSample>,
    /// Magnitude of the sample that completed the capture.
    pub peak_magnitude: f32,
}

/// Running counters, reported through the agent status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub samples_processed: u64,
    pub samples_dropped_unworn: u64,
    pub thresholds_detected: u64,
    pub events_emitted: u64,
    pub captures_aborted: u64,
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub history_len: usize,
    pub history_capacity: usize,
    pub collecting: bool,
    pub capture_len: usize,
    pub consecutive_high: u32,
    pub stats: EngineStats,
}

struct EngineState {
    history: HistoryBuffer,
    /// `Some` exactly while a capture is being collected.
    capture: Option<Vec<MotionSample>>,
    consecutive_high: u32,
    stats: EngineStats,
}

impl EngineState {
    fn abort_capture(&mut self) -> bool {
        self.consecutive_high = 0;
        if self.capture.take().is_some() {
            self.stats.captures_aborted += 1;
            true
        } else {
            false
        }
    }
}

/// Thread-safe motion window engine.
pub struct MotionEngine {
    config: DetectionConfig,
    wear: Arc<WearGate>,
    state: Mutex<EngineState>,
}

impl MotionEngine {
    /// Create an engine with its own wear gate (initially not worn).
    pub fn new(config: DetectionConfig) -> Result<Self> {
        Self::with_wear_gate(config, Arc::new(WearGate::default()))
    }

    /// Create an engine sharing an existing wear gate.
    pub fn with_wear_gate(config: DetectionConfig, wear: Arc<WearGate>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(EngineState {
                history: HistoryBuffer::new(config.buffer_size),
                capture: None,
                consecutive_high: 0,
                stats: EngineStats::default(),
            }),
            config,
            wear,
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn wear_gate(&self) -> &Arc<WearGate> {
        &self.wear
    }

    pub fn is_worn(&self) -> bool {
        self.wear.is_worn()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed a pulse reading. Taking the device off discards any capture in
    /// progress and zeroes the high-acceleration counter.
    pub fn on_pulse_sample(&self, value: i32, now_ms: u64) -> WearTransition {
        let transition = self.wear.on_pulse_sample(value, now_ms);
        if transition == WearTransition::BecameUnworn {
            let mut st = self.lock();
            if st.abort_capture() {
                log::warn!("device removed mid-capture, discarding partial window");
            }
        }
        transition
    }

    /// Process one accelerometer tick. Returns the completed window when this
    /// sample fills the post-trigger capture.
    pub fn on_motion_sample(&self, sample: MotionSample) -> Option<DetectionEvent> {
        let mut guard = self.lock();
        let st = &mut *guard;

        // Callers gate on wear state already; a sample racing a removal ends
        // up here.
        if !self.wear.is_worn() {
            st.stats.samples_dropped_unworn += 1;
            return None;
        }
        st.stats.samples_processed += 1;

        let magnitude = sample.magnitude();
        if magnitude > self.config.magnitude_threshold {
            st.consecutive_high = st.consecutive_high.saturating_add(1);
        } else {
            st.consecutive_high = 0;
        }
        let threshold_exceeded = st.consecutive_high >= self.config.sustained_count;

        let event = match st.capture.take() {
            Some(mut capture) => {
                capture.push(sample);
                if capture.len() >= self.config.post_threshold_size {
                    Some(self.complete_capture(st, capture, magnitude))
                } else {
                    st.capture = Some(capture);
                    None
                }
            }
            None if threshold_exceeded => {
                st.stats.thresholds_detected += 1;
                log::warn!(
                    "potential fall motion #{} (magnitude {magnitude:.1}), collecting post-trigger window",
                    st.stats.thresholds_detected
                );
                let mut capture = Vec::with_capacity(self.config.post_threshold_size);
                capture.push(sample);
                st.capture = Some(capture);
                None
            }
            None => None,
        };

        st.history.push(sample);
        event
    }

    /// Splice the history that preceded the trigger with the capture.
    ///
    /// Capture samples are also appended to history as they arrive, so all
    /// but the current one (not yet pushed) are skipped when reading back
    /// the pre-trigger part.
    fn complete_capture(
        &self,
        st: &mut EngineState,
        capture: Vec<MotionSample>,
        magnitude: f32,
    ) -> DetectionEvent {
        let post = self.config.post_threshold_size;
        let already_in_history = capture.len() - 1;
        let pre = st
            .history
            .preceding(already_in_history, self.config.pre_threshold_size());

        let mut window = Vec::with_capacity(pre.len() + post);
        window.extend_from_slice(&pre);
        window.extend_from_slice(&capture[..post]);

        st.consecutive_high = 0;
        st.stats.events_emitted += 1;

        let event = DetectionEvent {
            id: Uuid::new_v4(),
            sequence: st.stats.events_emitted,
            window,
            peak_magnitude: magnitude,
        };
        log::info!(
            "capture #{} complete: {} samples ({} pre, {} post)",
            event.sequence,
            event.window.len(),
            pre.len(),
            post
        );
        event
    }

    /// Drop history, capture and counter. Counters in [`EngineStats`] are kept.
    pub fn reset(&self) {
        let mut st = self.lock();
        st.history.clear();
        st.capture = None;
        st.consecutive_high = 0;
    }

    pub fn is_collecting(&self) -> bool {
        self.lock().capture.is_some()
    }

    /// Copy of the history ring, oldest first.
    pub fn history(&self) -> Vec<MotionSample> {
        self.lock().history.iter().collect()
    }

    pub fn stats(&self) -> EngineStats {
        self.lock().stats
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let st = self.lock();
        EngineSnapshot {
            history_len: st.history.len(),
            history_capacity: st.history.capacity(),
            collecting: st.capture.is_some(),
            capture_len: st.capture.as_ref().map_or(0, Vec::len),
            consecutive_high: st.consecutive_high,
            stats: st.stats,
        }
    }
}
