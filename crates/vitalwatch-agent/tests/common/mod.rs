//! Shared mocks for the agent integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use vitalwatch_agent::{CollectorClient, PushChannel, TransportError};
use vitalwatch_core::{
    AgentConfig, AnalysisResponse, Axis3, DetectionConfig, DetectionEvent, MotionAnalysisRequest,
    MotionEngine, MotionSample, VitalsRecord,
};

pub const SERVER_URL: &str = "http://127.0.0.1:5000/sensors";

pub fn test_config() -> AgentConfig {
    AgentConfig {
        server_url: SERVER_URL.to_string(),
        ..AgentConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockCollector {
    vitals: Mutex<Vec<(Instant, VitalsRecord)>>,
    analyses: Mutex<Vec<MotionAnalysisRequest>>,
    pub fall_detected: AtomicBool,
    pub fail_vitals: AtomicBool,
    pub fail_analysis: AtomicBool,
}

impl MockCollector {
    pub fn confirming() -> Self {
        let c = Self::default();
        c.fall_detected.store(true, Ordering::SeqCst);
        c
    }

    pub fn vitals(&self) -> Vec<VitalsRecord> {
        self.vitals.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn vitals_times(&self) -> Vec<Instant> {
        self.vitals.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn vitals_count(&self) -> usize {
        self.vitals.lock().unwrap().len()
    }

    pub fn analyses(&self) -> Vec<MotionAnalysisRequest> {
        self.analyses.lock().unwrap().clone()
    }
}

impl CollectorClient for MockCollector {
    async fn post_vitals(&self, record: &VitalsRecord) -> Result<u16, TransportError> {
        self.vitals
            .lock()
            .unwrap()
            .push((Instant::now(), record.clone()));
        if self.fail_vitals.load(Ordering::SeqCst) {
            Err(TransportError::Status(503))
        } else {
            Ok(200)
        }
    }

    async fn analyze_motion(
        &self,
        request: &MotionAnalysisRequest,
    ) -> Result<AnalysisResponse, TransportError> {
        self.analyses.lock().unwrap().push(request.clone());
        if self.fail_analysis.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout);
        }
        Ok(AnalysisResponse {
            fall_detected: self.fall_detected.load(Ordering::SeqCst),
        })
    }
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockPush {
    pub connected: AtomicBool,
    emitted: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MockPush {
    pub fn connected() -> Self {
        let p = Self::default();
        p.connected.store(true, Ordering::SeqCst);
        p
    }

    pub fn emitted(&self) -> Vec<(String, serde_json::Value)> {
        self.emitted.lock().unwrap().clone()
    }
}

impl PushChannel for MockPush {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: &str, payload: &serde_json::Value) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        self.emitted
            .lock()
            .unwrap()
            .push((event.to_string(), payload.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// Accelerometer reading with the given magnitude.
pub fn accel(magnitude: f32) -> Axis3 {
    Axis3::new(0.0, 0.0, magnitude)
}

/// Run a real engine through one complete capture.
pub fn captured_event() -> DetectionEvent {
    let engine = MotionEngine::new(DetectionConfig::default()).unwrap();
    engine.on_pulse_sample(72, 0);
    let mut ts = 0;
    for magnitude in std::iter::repeat_n(9.8, 400).chain(std::iter::repeat_n(60.0, 400)) {
        let sample = MotionSample::new(accel(magnitude), Axis3::ZERO, ts);
        ts += 20;
        if let Some(event) = engine.on_motion_sample(sample) {
            return event;
        }
    }
    panic!("no capture completed");
}

/// Poll `cond` every 10ms until it holds or two seconds pass.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
