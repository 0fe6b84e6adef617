//! The two delivery channels towards the collector.
//!
//! Every payload goes out best-effort. Callers log failures and move on; the
//! next telemetry cycle is the implicit retry.

pub mod http;
pub mod push;

use std::future::Future;

use tokio::task::JoinHandle;
use vitalwatch_core::{AnalysisResponse, MotionAnalysisRequest, VitalsRecord};

use crate::error::TransportError;
use crate::scheduler::FreshVitalsTrigger;

pub use http::HttpCollector;
pub use push::{PushFrame, TcpPushChannel};

/// Request/response side of the collector.
pub trait CollectorClient: Send + Sync + 'static {
    /// POST a vitals record. `Ok` carries the (success) status code.
    fn post_vitals(
        &self,
        record: &VitalsRecord,
    ) -> impl Future<Output = Result<u16, TransportError>> + Send;

    /// Submit a captured motion window for fall confirmation.
    fn analyze_motion(
        &self,
        request: &MotionAnalysisRequest,
    ) -> impl Future<Output = Result<AnalysisResponse, TransportError>> + Send;
}

/// Duplex event channel to the collector.
pub trait PushChannel: Send + Sync + 'static {
    /// Last-known connectivity. Drives the status indicator and whether the
    /// scheduler emits at all.
    fn is_connected(&self) -> bool;

    /// Queue an event frame. Never waits on the network.
    fn emit(&self, event: &str, payload: &serde_json::Value) -> Result<(), TransportError>;

    /// Begin connecting in the background. Inbound fresh-vitals requests are
    /// forwarded to `trigger`. Returns the connection task, if any, so the
    /// owner can cancel it.
    fn start(&self, trigger: FreshVitalsTrigger) -> Option<JoinHandle<()>> {
        let _ = trigger;
        None
    }
}

/// Push channel for deployments without a push peer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPush;

impl PushChannel for NoPush {
    fn is_connected(&self) -> bool {
        false
    }

    fn emit(&self, _event: &str, _payload: &serde_json::Value) -> Result<(), TransportError> {
        Err(TransportError::Disconnected)
    }
}
