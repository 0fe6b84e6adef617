//! Periodic vitals telemetry.
//!
//! The scheduler waits for the first wall-clock boundary, sends one cycle,
//! then repeats on a fixed interval. On-demand requests run an extra cycle
//! without moving the periodic phase. Each cycle is its own task, so a hung
//! or panicking send never delays the next tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use vitalwatch_core::{
    AgentConfig, LatestVitals, SENSORS_EVENT, VitalsRecord, delay_until_next_boundary,
    rounded_timestamp,
};

use crate::transport::{CollectorClient, PushChannel};

// ---------------------------------------------------------------------------
// On-demand trigger
// ---------------------------------------------------------------------------

/// Cloneable handle that requests an immediate telemetry cycle.
#[derive(Debug, Clone)]
pub struct FreshVitalsTrigger(mpsc::UnboundedSender<()>);

impl FreshVitalsTrigger {
    /// Returns `false` once the scheduler is gone.
    pub fn fire(&self) -> bool {
        self.0.send(()).is_ok()
    }
}

pub fn fresh_vitals_channel() -> (FreshVitalsTrigger, mpsc::UnboundedReceiver<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FreshVitalsTrigger(tx), rx)
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// When the first periodic cycle runs and how often after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTiming {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl ScheduleTiming {
    /// First cycle at the next local wall-clock multiple of `interval`.
    pub fn aligned(interval: Duration) -> Self {
        Self {
            initial_delay: delay_until_next_boundary(&Local::now(), interval),
            interval,
        }
    }

    /// First cycle right away.
    pub fn immediate(interval: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        if config.align_to_wall_clock {
            Self::aligned(config.report_interval())
        } else {
            Self::immediate(config.report_interval())
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes and counters
// ---------------------------------------------------------------------------

/// What happened on the push side of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Sent,
    SkippedDisconnected,
    Failed(String),
}

/// What happened on the HTTP side of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum HttpOutcome {
    Delivered { status: u16 },
    Failed { reason: String },
}

impl HttpOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub record: VitalsRecord,
    pub push: PushOutcome,
    pub http: HttpOutcome,
}

#[derive(Debug, Default)]
struct TelemetryStats {
    periodic_cycles: AtomicU64,
    on_demand_cycles: AtomicU64,
    push_sent: AtomicU64,
    push_skipped: AtomicU64,
    push_failed: AtomicU64,
    http_delivered: AtomicU64,
    http_failed: AtomicU64,
    last_http: Mutex<Option<HttpOutcome>>,
}

/// Telemetry counters as reported in the agent status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetryCounts {
    pub periodic_cycles: u64,
    pub on_demand_cycles: u64,
    pub push_sent: u64,
    pub push_skipped: u64,
    pub push_failed: u64,
    pub http_delivered: u64,
    pub http_failed: u64,
    pub last_http: Option<HttpOutcome>,
}

#[derive(Debug, Clone, Copy)]
enum CycleKind {
    Periodic,
    OnDemand,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct TelemetryScheduler<C, P> {
    collector: Arc<C>,
    push: Arc<P>,
    vitals: Arc<LatestVitals>,
    patient_id: String,
    stats: TelemetryStats,
}

impl<C: CollectorClient, P: PushChannel> TelemetryScheduler<C, P> {
    pub fn new(
        collector: Arc<C>,
        push: Arc<P>,
        vitals: Arc<LatestVitals>,
        patient_id: impl Into<String>,
    ) -> Self {
        Self {
            collector,
            push,
            vitals,
            patient_id: patient_id.into(),
            stats: TelemetryStats::default(),
        }
    }

    /// Run one snapshot-and-send cycle. Both channels are attempted; neither
    /// failure affects the other.
    pub async fn send_cycle(&self) -> CycleReport {
        {
            let mut rng = rand::rng();
            self.vitals.refresh_simulated(&mut rng);
        }
        let snapshot = self.vitals.snapshot();
        let rounded = rounded_timestamp(&Local::now());
        let record = VitalsRecord::new(&self.patient_id, &snapshot, &rounded);

        let push = self.emit_push(&record);
        match &push {
            PushOutcome::Sent => {
                self.stats.push_sent.fetch_add(1, Ordering::Relaxed);
            }
            PushOutcome::SkippedDisconnected => {
                log::debug!("push channel disconnected, skipping vitals emit");
                self.stats.push_skipped.fetch_add(1, Ordering::Relaxed);
            }
            PushOutcome::Failed(reason) => {
                log::warn!("vitals push failed: {reason}");
                self.stats.push_failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        let http = match self.collector.post_vitals(&record).await {
            Ok(status) => {
                log::info!(
                    "vitals sent for {} (hr={}, status {status})",
                    record.datetime,
                    record.heart_rate
                );
                self.stats.http_delivered.fetch_add(1, Ordering::Relaxed);
                HttpOutcome::Delivered { status }
            }
            Err(e) => {
                log::warn!("vitals POST failed: {e}");
                self.stats.http_failed.fetch_add(1, Ordering::Relaxed);
                HttpOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        *self
            .stats
            .last_http
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(http.clone());

        CycleReport { record, push, http }
    }

    fn emit_push(&self, record: &VitalsRecord) -> PushOutcome {
        if !self.push.is_connected() {
            return PushOutcome::SkippedDisconnected;
        }
        let payload = match serde_json::to_value(record) {
            Ok(v) => v,
            Err(e) => return PushOutcome::Failed(e.to_string()),
        };
        match self.push.emit(SENSORS_EVENT, &payload) {
            Ok(()) => PushOutcome::Sent,
            Err(e) => PushOutcome::Failed(e.to_string()),
        }
    }

    /// Drive periodic and on-demand cycles until the task is aborted.
    ///
    /// Aborting drops the in-flight cycle set, which cancels any send still
    /// waiting on the network.
    pub async fn run(
        self: Arc<Self>,
        timing: ScheduleTiming,
        mut requests: mpsc::UnboundedReceiver<()>,
    ) {
        log::info!(
            "telemetry scheduler started: first cycle in {:.1}s, then every {}s",
            timing.initial_delay.as_secs_f64(),
            timing.interval.as_secs()
        );
        let mut ticker =
            tokio::time::interval_at(Instant::now() + timing.initial_delay, timing.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycles = JoinSet::new();
        let mut requests_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.spawn_cycle(&mut cycles, CycleKind::Periodic),
                request = requests.recv(), if requests_open => match request {
                    Some(()) => self.spawn_cycle(&mut cycles, CycleKind::OnDemand),
                    None => requests_open = false,
                },
                Some(joined) = cycles.join_next(), if !cycles.is_empty() => match joined {
                    Err(e) if e.is_panic() => log::error!("telemetry cycle panicked: {e}"),
                    _ => {}
                },
            }
        }
    }

    fn spawn_cycle(self: &Arc<Self>, cycles: &mut JoinSet<()>, kind: CycleKind) {
        let counter = match kind {
            CycleKind::Periodic => &self.stats.periodic_cycles,
            CycleKind::OnDemand => &self.stats.on_demand_cycles,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        log::debug!("starting {kind:?} telemetry cycle");
        let this = Arc::clone(self);
        cycles.spawn(async move {
            this.send_cycle().await;
        });
    }

    pub fn counts(&self) -> TelemetryCounts {
        TelemetryCounts {
            periodic_cycles: self.stats.periodic_cycles.load(Ordering::Relaxed),
            on_demand_cycles: self.stats.on_demand_cycles.load(Ordering::Relaxed),
            push_sent: self.stats.push_sent.load(Ordering::Relaxed),
            push_skipped: self.stats.push_skipped.load(Ordering::Relaxed),
            push_failed: self.stats.push_failed.load(Ordering::Relaxed),
            http_delivered: self.stats.http_delivered.load(Ordering::Relaxed),
            http_failed: self.stats.http_failed.load(Ordering::Relaxed),
            last_http: self
                .stats
                .last_http
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}
