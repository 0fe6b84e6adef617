//! Agent configuration.
//!
//! Persisted as pretty-printed JSON. Every field has a default so a partial
//! file (or just a server URL) is enough to start the agent.

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ring capacity: pre-trigger history plus post-trigger capture.
pub const BUFFER_SIZE: usize = 680;
/// Samples collected after a trigger before the window is flushed.
pub const POST_THRESHOLD_SIZE: usize = 340;
/// Accelerometer magnitude (m/s²) above which a sample counts as high.
pub const ACCEL_MAGNITUDE_THRESHOLD: f32 = 50.0;
/// Consecutive high samples needed to trigger a capture.
pub const SUSTAINED_HIGH_ACCEL_COUNT: u32 = 5;

pub const DEFAULT_PATIENT_ID: &str = "00001";
/// Port the collector listens on when addressed by IP alone.
pub const COLLECTOR_PORT: u16 = 5000;
pub const DEFAULT_CONFIG_FILE: &str = "vitalwatch.json";

/// Thresholds and window sizes for the motion engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub buffer_size: usize,
    pub post_threshold_size: usize,
    pub magnitude_threshold: f32,
    pub sustained_count: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            buffer_size: BUFFER_SIZE,
            post_threshold_size: POST_THRESHOLD_SIZE,
            magnitude_threshold: ACCEL_MAGNITUDE_THRESHOLD,
            sustained_count: SUSTAINED_HIGH_ACCEL_COUNT,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.post_threshold_size == 0 || self.post_threshold_size >= self.buffer_size {
            return Err(Error::InvalidConfig(format!(
                "post_threshold_size ({}) must be in 1..buffer_size ({})",
                self.post_threshold_size, self.buffer_size
            )));
        }
        if self.sustained_count == 0 {
            return Err(Error::InvalidConfig(
                "sustained_count must be at least 1".to_string(),
            ));
        }
        if !self.magnitude_threshold.is_finite() || self.magnitude_threshold <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "magnitude_threshold must be a positive number, got {}",
                self.magnitude_threshold
            )));
        }
        Ok(())
    }

    /// Number of history samples placed ahead of the capture in a window.
    pub fn pre_threshold_size(&self) -> usize {
        self.buffer_size - self.post_threshold_size
    }
}

/// Full agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Vitals endpoint, e.g. `http://10.0.0.2:5000/sensors`.
    pub server_url: String,
    pub patient_id: String,
    /// `host:port` of the push channel peer. No push channel when unset.
    pub push_address: Option<String>,
    pub report_interval_secs: u64,
    /// Wait for the next wall-clock multiple of the interval before the
    /// first periodic send.
    pub align_to_wall_clock: bool,
    pub vitals_timeout_secs: u64,
    pub analysis_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
    pub wear_status_interval_secs: u64,
    pub detection: DetectionConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            patient_id: DEFAULT_PATIENT_ID.to_string(),
            push_address: None,
            report_interval_secs: 300,
            align_to_wall_clock: true,
            vitals_timeout_secs: 5,
            analysis_timeout_secs: 10,
            reconnect_delay_secs: 5,
            wear_status_interval_secs: 10,
            detection: DetectionConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Read a config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Like [`load`](Self::load) but falls back to defaults when the file
    /// does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(Error::InvalidConfig("server_url is not set".to_string()));
        }
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "server_url must start with http:// or https://, got {}",
                self.server_url
            )));
        }
        validate_patient_id(&self.patient_id)?;
        if self.report_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "report_interval_secs must be non-zero".to_string(),
            ));
        }
        self.detection.validate()
    }

    /// Point the agent at a collector by IPv4 address, replacing
    /// `server_url` with `http://<ip>:5000/sensors`.
    pub fn set_server_ip(&mut self, ip: &str) -> Result<()> {
        self.server_url = collector_url_for_ip(ip)?;
        Ok(())
    }

    /// Collector base address derived from the vitals URL.
    ///
    /// `http://host:5000/sensors` and `http://host:5000/api/sensors/` both
    /// map to the prefix before the last `/sensors`; any other URL maps to
    /// the prefix before its last `/`.
    pub fn base_url(&self) -> String {
        let url = self.server_url.as_str();
        match url.rfind("/sensors") {
            Some(idx) => url[..idx].to_string(),
            None => match url.rfind('/') {
                Some(idx) if idx > url.find("://").map_or(0, |i| i + 2) => url[..idx].to_string(),
                _ => url.to_string(),
            },
        }
    }

    pub fn analysis_url(&self) -> String {
        format!("{}/analyze_motion_batch", self.base_url())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn vitals_timeout(&self) -> Duration {
        Duration::from_secs(self.vitals_timeout_secs)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Patient IDs are exactly five ASCII digits, e.g. `00001`.
pub fn validate_patient_id(id: &str) -> Result<()> {
    if id.len() == 5 && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "patient_id must be 5 digits (e.g. 00001), got '{id}'"
        )))
    }
}

/// Vitals URL for a collector addressed by dotted-quad IPv4 address.
pub fn collector_url_for_ip(ip: &str) -> Result<String> {
    let addr: Ipv4Addr = ip
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid IPv4 address '{ip}'")))?;
    Ok(format!("http://{addr}:{COLLECTOR_PORT}/sensors"))
}
