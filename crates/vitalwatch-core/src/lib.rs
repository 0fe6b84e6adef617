//! # vitalwatch-core
//!
//! **Streaming fall detection for a wrist-worn device.**
//!
//! `vitalwatch-core` holds the synchronous heart of the vitalwatch agent: a
//! fixed-memory motion history, sustained-threshold detection, pre/post-event
//! window capture, and the pulse-driven wear gate that decides whether any of
//! it runs.
//!
//! ## Quick Start
//!
//! ```
//! use vitalwatch_core::{Axis3, DetectionConfig, MotionEngine, MotionSample};
//!
//! let engine = MotionEngine::new(DetectionConfig::default()).unwrap();
//! engine.on_pulse_sample(72, 0); // pulse present: device is worn
//!
//! let sample = MotionSample::new(Axis3::new(0.0, 0.0, 9.81), Axis3::ZERO, 0);
//! assert!(engine.on_motion_sample(sample).is_none());
//! assert_eq!(engine.snapshot().history_len, 1);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Pulse → WearGate ─┐
//!                   ├→ MotionEngine (history ring + capture) → DetectionEvent
//! Accel + Gyro ─────┘
//! ```
//!
//! Detection events are plain owned data. Shipping them to the analysis
//! service, and the periodic vitals reports built from [`LatestVitals`], are
//! the job of `vitalwatch-agent`.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod payload;
pub mod sample;
pub mod vitals;
pub mod wear;

pub use clock::{delay_until_next_boundary, format_datetime, rounded_timestamp};
pub use config::{
    ACCEL_MAGNITUDE_THRESHOLD, AgentConfig, BUFFER_SIZE, COLLECTOR_PORT, DetectionConfig,
    POST_THRESHOLD_SIZE, SUSTAINED_HIGH_ACCEL_COUNT, collector_url_for_ip, validate_patient_id,
};
pub use engine::{DetectionEvent, EngineSnapshot, EngineStats, MotionEngine};
pub use error::{Error, Result};
pub use history::HistoryBuffer;
pub use payload::{
    AnalysisResponse, FRESH_VITALS_EVENT, MotionAnalysisRequest, MotionRecord, SENSORS_EVENT,
    VitalsRecord,
};
pub use sample::{Axis3, GyroLatch, MotionSample};
pub use vitals::{LatestVitals, SimulatedVitals, VitalsSnapshot};
pub use wear::{WearGate, WearTransition};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
