//! JSON bodies exchanged with the collector.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::clock::format_datetime;
use crate::sample::{Axis3, MotionSample};
use crate::vitals::VitalsSnapshot;

/// Push-channel event carrying a [`VitalsRecord`].
pub const SENSORS_EVENT: &str = "sensors";
/// Inbound push-channel event asking for an immediate vitals send.
pub const FRESH_VITALS_EVENT: &str = "request_fresh_vitals";

/// One motion sample as the analysis service expects it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionRecord {
    pub accelerometer: Axis3,
    pub gyroscope: Axis3,
    pub timestamp: u64,
}

impl From<&MotionSample> for MotionRecord {
    fn from(s: &MotionSample) -> Self {
        Self {
            accelerometer: s.accel,
            gyroscope: s.gyro,
            timestamp: s.timestamp,
        }
    }
}

/// Body of `POST <base>/analyze_motion_batch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionAnalysisRequest {
    pub motion_data: Vec<MotionRecord>,
    pub patient_id: String,
}

impl MotionAnalysisRequest {
    pub fn new(window: &[MotionSample], patient_id: &str) -> Self {
        Self {
            motion_data: window.iter().map(MotionRecord::from).collect(),
            patient_id: patient_id.to_string(),
        }
    }
}

/// Analysis verdict. Extra fields the service sends are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub fall_detected: bool,
}

/// Periodic vitals report, sent both over the push channel and by HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsRecord {
    pub patient_id: String,
    /// Epoch milliseconds, rounded to the reporting grid.
    pub time_stamp: i64,
    pub heart_rate: i32,
    pub oxygen_saturation: u32,
    pub systolic_pressure: u32,
    pub diastolic_pressure: u32,
    pub body_temperature: f64,
    pub respiratory_rate: u32,
    /// Not measured by the watch; always serialized as `null`.
    pub glucose: Option<f64>,
    /// `time_stamp` rendered as `yyyy-MM-dd HH:mm:ss` local time.
    pub datetime: String,
}

impl VitalsRecord {
    /// Build a record for an already-rounded timestamp.
    pub fn new<Tz: TimeZone>(patient_id: &str, vitals: &VitalsSnapshot, rounded: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            patient_id: patient_id.to_string(),
            time_stamp: rounded.timestamp_millis(),
            heart_rate: vitals.heart_rate,
            oxygen_saturation: vitals.simulated.oxygen_saturation,
            systolic_pressure: vitals.simulated.systolic_pressure,
            diastolic_pressure: vitals.simulated.diastolic_pressure,
            body_temperature: vitals.simulated.body_temperature,
            respiratory_rate: vitals.simulated.respiratory_rate,
            glucose: None,
            datetime: format_datetime(rounded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vitals::SimulatedVitals;
    use chrono::Utc;

    #[test]
    fn test_motion_request_shape() {
        let window = vec![MotionSample::new(
            Axis3::new(1.0, 2.0, 3.0),
            Axis3::new(0.5, 0.25, 0.125),
            1234,
        )];
        let req = MotionAnalysisRequest::new(&window, "00001");
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["patient_id"], "00001");
        let first = &json["motion_data"][0];
        assert_eq!(first["accelerometer"]["x"], 1.0);
        assert_eq!(first["accelerometer"]["z"], 3.0);
        assert_eq!(first["gyroscope"]["y"], 0.25);
        assert_eq!(first["timestamp"], 1234);
    }

    #[test]
    fn test_analysis_response_tolerates_extra_and_missing_fields() {
        let r: AnalysisResponse =
            serde_json::from_str(r#"{"fall_detected": true, "confidence": 0.93}"#).unwrap();
        assert!(r.fall_detected);

        let r: AnalysisResponse = serde_json::from_str(r#"{"status": "ok"}"#).unwrap();
        assert!(!r.fall_detected);
    }

    #[test]
    fn test_vitals_record_fields() {
        let rounded = Utc.with_ymd_and_hms(2026, 3, 14, 10, 50, 0).unwrap();
        let snap = VitalsSnapshot {
            heart_rate: 72,
            simulated: SimulatedVitals {
                oxygen_saturation: 98,
                systolic_pressure: 121,
                diastolic_pressure: 79,
                body_temperature: 36.7,
                respiratory_rate: 15,
            },
        };
        let record = VitalsRecord::new("00001", &snap, &rounded);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["time_stamp"], rounded.timestamp_millis());
        assert_eq!(json["heart_rate"], 72);
        assert_eq!(json["oxygen_saturation"], 98);
        assert_eq!(json["respiratory_rate"], 15);
        assert!(json["glucose"].is_null());
        assert_eq!(json["datetime"], "2026-03-14 10:50:00");
        assert_eq!(json.as_object().unwrap().len(), 10);
    }
}
