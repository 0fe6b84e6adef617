//! Agent lifecycle and the sensor-facing entry points.
//!
//! Sensor callbacks run on whatever thread the host delivers them on. They
//! only touch the engine lock, a few atomics and an unbounded queue, so they
//! never wait on the network. Everything that does I/O runs in tasks the
//! agent spawns on `start` and aborts on `shutdown`.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vitalwatch_core::{
    AgentConfig, Axis3, DetectionEvent, EngineSnapshot, GyroLatch, LatestVitals, MotionEngine,
    VitalsSnapshot, WearGate, WearTransition,
};

use crate::dispatcher::{DispatchCounts, EventDispatcher};
use crate::error::AgentError;
use crate::scheduler::{
    FreshVitalsTrigger, ScheduleTiming, TelemetryCounts, TelemetryScheduler, fresh_vitals_channel,
};
use crate::transport::{CollectorClient, PushChannel};

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Lifecycle {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl Lifecycle {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Everything the status API reports about a running agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub lifecycle: Lifecycle,
    pub uptime_secs: f64,
    pub patient_id: String,
    pub server_url: String,
    pub push_connected: bool,
    pub worn: bool,
    /// Samples delivered while the agent was not running.
    pub samples_ignored: u64,
    pub engine: EngineSnapshot,
    pub vitals: VitalsSnapshot,
    pub telemetry: TelemetryCounts,
    pub dispatch: DispatchCounts,
}

/// Object-safe view of an agent for the status API.
pub trait AgentControl: Send + Sync + 'static {
    fn status(&self) -> AgentStatus;

    /// Ask for an immediate telemetry cycle. `false` when not running.
    fn request_fresh_vitals(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Senders that exist only while the agent runs.
struct RunChannels {
    events: mpsc::UnboundedSender<DetectionEvent>,
    fresh: FreshVitalsTrigger,
}

pub struct Agent<C, P> {
    config: AgentConfig,
    engine: Arc<MotionEngine>,
    vitals: Arc<LatestVitals>,
    gyro: GyroLatch,
    push: Arc<P>,
    dispatcher: Arc<EventDispatcher<C>>,
    scheduler: Arc<TelemetryScheduler<C, P>>,
    state: AtomicU8,
    /// Held shared by sensor callbacks while they touch the engine; shutdown
    /// takes it exclusively once to wait out callbacks already in flight.
    session: RwLock<()>,
    channels: Mutex<Option<RunChannels>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started_at: Mutex<Option<Instant>>,
    samples_ignored: AtomicU64,
}

impl<C: CollectorClient, P: PushChannel> Agent<C, P> {
    pub fn new(config: AgentConfig, collector: Arc<C>, push: Arc<P>) -> Result<Self, AgentError> {
        config.validate()?;
        let wear = Arc::new(WearGate::with_status_interval(
            false,
            config.wear_status_interval_secs.saturating_mul(1000),
        ));
        let engine = Arc::new(MotionEngine::with_wear_gate(
            config.detection,
            Arc::clone(&wear),
        )?);
        let vitals = Arc::new(LatestVitals::new());
        let dispatcher = Arc::new(EventDispatcher::new(
            Arc::clone(&collector),
            wear,
            config.patient_id.clone(),
        ));
        let scheduler = Arc::new(TelemetryScheduler::new(
            collector,
            Arc::clone(&push),
            Arc::clone(&vitals),
            config.patient_id.clone(),
        ));
        Ok(Self {
            config,
            engine,
            vitals,
            gyro: GyroLatch::new(),
            push,
            dispatcher,
            scheduler,
            state: AtomicU8::new(Lifecycle::Stopped as u8),
            session: RwLock::new(()),
            channels: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            started_at: Mutex::new(None),
            samples_ignored: AtomicU64::new(0),
        })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle() == Lifecycle::Running
    }

    fn set_lifecycle(&self, next: Lifecycle) {
        self.state.store(next as u8, Ordering::SeqCst);
    }

    /// Enter a sensor callback. `None`, and the sample counted as ignored,
    /// unless the agent is running.
    fn enter_callback(&self) -> Option<RwLockReadGuard<'_, ()>> {
        let guard = self.session.read().unwrap_or_else(PoisonError::into_inner);
        if self.is_running() {
            Some(guard)
        } else {
            self.samples_ignored.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    fn channels(&self) -> MutexGuard<'_, Option<RunChannels>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the dispatcher, scheduler and push connection. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) -> Result<(), AgentError> {
        self.start_with_timing(ScheduleTiming::from_config(&self.config))
    }

    /// [`start`](Self::start) with an explicit telemetry schedule.
    pub fn start_with_timing(&self, timing: ScheduleTiming) -> Result<(), AgentError> {
        if let Err(current) = self.state.compare_exchange(
            Lifecycle::Stopped as u8,
            Lifecycle::Starting as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            return Err(AgentError::NotStopped(Lifecycle::from_u8(current)));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (fresh, requests) = fresh_vitals_channel();

        let mut tasks = vec![
            tokio::spawn(Arc::clone(&self.dispatcher).run(events_rx)),
            tokio::spawn(Arc::clone(&self.scheduler).run(timing, requests)),
        ];
        if let Some(handle) = self.push.start(fresh.clone()) {
            tasks.push(handle);
        }

        *self.channels() = Some(RunChannels {
            events: events_tx,
            fresh,
        });
        *self.tasks.lock().unwrap_or_else(PoisonError::into_inner) = tasks;
        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        self.set_lifecycle(Lifecycle::Running);

        log::info!(
            "agent running for patient {} (collector {})",
            self.config.patient_id,
            self.config.server_url
        );
        Ok(())
    }

    /// Stop accepting samples, cancel every task and clear the engine and the
    /// wear state. A no-op unless running.
    pub async fn shutdown(&self) {
        if self
            .state
            .compare_exchange(
                Lifecycle::Running as u8,
                Lifecycle::Stopping as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return;
        }
        log::info!("agent stopping");

        // Callbacks that saw Running finish before the engine is cleared.
        drop(self.session.write().unwrap_or_else(PoisonError::into_inner));

        self.channels().take();
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
        self.engine.reset();
        self.engine.wear_gate().reset();
        self.vitals.set_heart_rate(0);
        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner) = None;

        self.set_lifecycle(Lifecycle::Stopped);
        log::info!("agent stopped");
    }

    // -----------------------------------------------------------------------
    // Sensor callbacks
    // -----------------------------------------------------------------------

    /// Accelerometer reading. Returns `false` when ignored because the agent
    /// is not running.
    pub fn on_accelerometer(&self, x: f32, y: f32, z: f32, timestamp: u64) -> bool {
        let Some(_session) = self.enter_callback() else {
            return false;
        };
        let sample = self.gyro.pair(Axis3::new(x, y, z), timestamp);
        if let Some(event) = self.engine.on_motion_sample(sample) {
            log::debug!("queueing event #{} for analysis", event.sequence);
            match self.channels().as_ref() {
                Some(ch) => {
                    if ch.events.send(event).is_err() {
                        log::warn!("event dispatcher gone, dropping capture");
                    }
                }
                None => log::debug!("agent stopping, dropping capture"),
            }
        }
        true
    }

    /// Gyroscope reading; only the latest one is kept.
    pub fn on_gyroscope(&self, x: f32, y: f32, z: f32) -> bool {
        let Some(_session) = self.enter_callback() else {
            return false;
        };
        self.gyro.store(Axis3::new(x, y, z));
        true
    }

    /// Pulse reading. `None` when ignored because the agent is not running.
    pub fn on_pulse(&self, bpm: i32, timestamp: u64) -> Option<WearTransition> {
        let _session = self.enter_callback()?;
        self.vitals.set_heart_rate(bpm);
        Some(self.engine.on_pulse_sample(bpm, timestamp))
    }

    pub fn request_fresh_vitals(&self) -> bool {
        match self.channels().as_ref() {
            Some(ch) => ch.fresh.fire(),
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<MotionEngine> {
        &self.engine
    }

    pub fn vitals(&self) -> &Arc<LatestVitals> {
        &self.vitals
    }

    pub fn scheduler(&self) -> &Arc<TelemetryScheduler<C, P>> {
        &self.scheduler
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher<C>> {
        &self.dispatcher
    }

    pub fn status(&self) -> AgentStatus {
        let uptime_secs = self
            .started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map_or(0.0, |t| t.elapsed().as_secs_f64());
        AgentStatus {
            lifecycle: self.lifecycle(),
            uptime_secs,
            patient_id: self.config.patient_id.clone(),
            server_url: self.config.server_url.clone(),
            push_connected: self.push.is_connected(),
            worn: self.engine.is_worn(),
            samples_ignored: self.samples_ignored.load(Ordering::Relaxed),
            engine: self.engine.snapshot(),
            vitals: self.vitals.snapshot(),
            telemetry: self.scheduler.counts(),
            dispatch: self.dispatcher.counts(),
        }
    }
}

impl<C: CollectorClient, P: PushChannel> AgentControl for Agent<C, P> {
    fn status(&self) -> AgentStatus {
        Agent::status(self)
    }

    fn request_fresh_vitals(&self) -> bool {
        Agent::request_fresh_vitals(self)
    }
}

impl<C, P> Drop for Agent<C, P> {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}
