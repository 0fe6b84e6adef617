//! # vitalwatch-agent
//!
//! Async half of the vitalwatch agent. Wraps a
//! [`MotionEngine`](vitalwatch_core::MotionEngine) in an [`Agent`] that
//! accepts sensor callbacks, ships completed capture windows for fall
//! confirmation, and reports vitals every five minutes over HTTP and an
//! optional push channel.
//!
//! ```text
//! sensor threads ──► Agent ──► MotionEngine ──► event queue ──► EventDispatcher ──► /analyze_motion_batch
//!                      │
//!                      └──► LatestVitals ◄── TelemetryScheduler ──► POST server_url
//!                                                 ▲        └──────► push "sensors"
//!                           push "request_fresh_vitals"
//! ```
//!
//! All I/O runs on tokio tasks spawned by [`Agent::start`] and cancelled by
//! [`Agent::shutdown`]. Transport failures are logged and absorbed.

pub mod agent;
pub mod dispatcher;
pub mod error;
pub mod scheduler;
pub mod transport;

pub use agent::{Agent, AgentControl, AgentStatus, Lifecycle};
pub use dispatcher::{DispatchCounts, DispatchOutcome, EventDispatcher};
pub use error::{AgentError, TransportError};
pub use scheduler::{
    CycleReport, FreshVitalsTrigger, HttpOutcome, PushOutcome, ScheduleTiming, TelemetryCounts,
    TelemetryScheduler, fresh_vitals_channel,
};
pub use transport::{CollectorClient, HttpCollector, NoPush, PushChannel, PushFrame, TcpPushChannel};
