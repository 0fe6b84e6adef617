//! Push channel over TCP with newline-delimited JSON frames.
//!
//! Each frame is one line: `{"event": "<name>", "data": <payload>}`. The
//! connection task reconnects forever with a fixed delay. Frames queued while
//! disconnected are dropped at the next connect rather than replayed, since a
//! stale vitals report is worth less than the next scheduled one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vitalwatch_core::FRESH_VITALS_EVENT;

use super::PushChannel;
use crate::error::TransportError;
use crate::scheduler::FreshVitalsTrigger;

/// One event frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PushFrame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Reconnecting TCP [`PushChannel`].
pub struct TcpPushChannel {
    address: String,
    reconnect_delay: Duration,
    connected: Arc<AtomicBool>,
    /// Present while a connection task is running.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl TcpPushChannel {
    pub fn new(address: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            address: address.into(),
            reconnect_delay,
            connected: Arc::new(AtomicBool::new(false)),
            outbound: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl PushChannel for TcpPushChannel {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: &str, payload: &serde_json::Value) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        let frame = PushFrame {
            event: event.to_string(),
            data: payload.clone(),
        };
        let line = frame.encode()?;
        match self
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(tx) => tx.send(line).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    /// Spawn a fresh connection task. The previous task, if any, must have
    /// been aborted; frames queued for it are abandoned.
    fn start(&self, trigger: FreshVitalsTrigger) -> Option<JoinHandle<()>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        self.connected.store(false, Ordering::SeqCst);
        Some(tokio::spawn(connection_loop(
            self.address.clone(),
            self.reconnect_delay,
            Arc::clone(&self.connected),
            rx,
            trigger,
        )))
    }
}

/// Clears the connectivity flag when the connection task ends, including
/// when it is aborted mid-session.
struct ConnectedFlag(Arc<AtomicBool>);

impl ConnectedFlag {
    fn set(&self, connected: bool) {
        self.0.store(connected, Ordering::SeqCst);
    }
}

impl Drop for ConnectedFlag {
    fn drop(&mut self) {
        self.set(false);
    }
}

/// Floor for a single connect attempt when the reconnect delay is tiny.
const MIN_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Connect with an upper bound so an unreachable peer costs one timeout per
/// attempt instead of the OS default.
async fn connect(address: &str, timeout: Duration) -> std::io::Result<TcpStream> {
    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("no answer within {}ms", timeout.as_millis()),
        )),
    }
}

async fn connection_loop(
    address: String,
    reconnect_delay: Duration,
    connected: Arc<AtomicBool>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    trigger: FreshVitalsTrigger,
) {
    let connected = ConnectedFlag(connected);
    loop {
        match connect(&address, reconnect_delay.max(MIN_CONNECT_TIMEOUT)).await {
            Ok(stream) => {
                // Discard anything queued before this connection existed.
                while outbound.try_recv().is_ok() {}
                connected.set(true);
                log::info!("push channel connected to {address}");

                let reason = run_session(stream, &mut outbound, &trigger).await;

                connected.set(false);
                match reason {
                    SessionEnd::Closed => {
                        log::info!("push channel shutting down");
                        return;
                    }
                    SessionEnd::Disconnected(why) => {
                        log::warn!("push channel disconnected: {why}");
                    }
                }
            }
            Err(e) => {
                log::debug!("push channel connect to {address} failed: {e}");
            }
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}

enum SessionEnd {
    /// Every sender is gone; the channel will never be used again.
    Closed,
    Disconnected(String),
}

async fn run_session(
    stream: TcpStream,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    trigger: &FreshVitalsTrigger,
) -> SessionEnd {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_inbound(&line, trigger),
                Ok(None) => return SessionEnd::Disconnected("peer closed the connection".to_string()),
                Err(e) => return SessionEnd::Disconnected(e.to_string()),
            },
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = writer.write_all(frame.as_bytes()).await {
                        return SessionEnd::Disconnected(e.to_string());
                    }
                }
                None => return SessionEnd::Closed,
            },
        }
    }
}

fn handle_inbound(line: &str, trigger: &FreshVitalsTrigger) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    match serde_json::from_str::<PushFrame>(line) {
        Ok(frame) if frame.event == FRESH_VITALS_EVENT => {
            log::info!("fresh vitals requested by collector");
            trigger.fire();
        }
        Ok(frame) => log::debug!("ignoring push event {}", frame.event),
        Err(e) => log::debug!("ignoring malformed push frame: {e}"),
    }
}
