//! `vitalwatch status`: query a running agent's status API.

use std::time::Duration;

use serde_json::Value;

pub fn run(url: &str, raw_json: bool) {
    let endpoint = format!("{}/status", url.trim_end_matches('/'));
    let rt = super::runtime();
    let body = match rt.block_on(fetch(&endpoint)) {
        Ok(body) => body,
        Err(e) => {
            eprintln!("Error querying {endpoint}: {e}");
            std::process::exit(1);
        }
    };

    if raw_json {
        match serde_json::to_string_pretty(&body) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }
    print!("{}", render(&body));
}

async fn fetch(endpoint: &str) -> Result<Value, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    client
        .get(endpoint)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}

fn yes_no(v: &Value) -> &'static str {
    if v.as_bool().unwrap_or(false) {
        "yes"
    } else {
        "no"
    }
}

/// Human-readable summary of an `AgentStatus` document.
fn render(s: &Value) -> String {
    let engine = &s["engine"];
    let stats = &engine["stats"];
    let vitals = &s["vitals"];
    let telemetry = &s["telemetry"];
    let dispatch = &s["dispatch"];

    let last_http = match telemetry["last_http"]["result"].as_str() {
        Some("delivered") => format!("delivered ({})", telemetry["last_http"]["status"]),
        Some("failed") => format!(
            "failed: {}",
            telemetry["last_http"]["reason"].as_str().unwrap_or("unknown")
        ),
        _ => "none yet".to_string(),
    };

    let mut out = String::new();
    out.push_str(&format!(
        "Agent {} for patient {} (up {:.0}s)\n",
        s["lifecycle"].as_str().unwrap_or("unknown"),
        s["patient_id"].as_str().unwrap_or("?"),
        s["uptime_secs"].as_f64().unwrap_or(0.0)
    ));
    out.push_str(&format!(
        "  Collector:   {}\n",
        s["server_url"].as_str().unwrap_or("?")
    ));
    out.push_str(&format!(
        "  Worn:        {}    Push connected: {}\n",
        yes_no(&s["worn"]),
        yes_no(&s["push_connected"])
    ));
    out.push_str(&format!(
        "  Vitals:      hr {}  spo2 {}  bp {}/{}  temp {:.1}  resp {}\n",
        vitals["heart_rate"],
        vitals["oxygen_saturation"],
        vitals["systolic_pressure"],
        vitals["diastolic_pressure"],
        vitals["body_temperature"].as_f64().unwrap_or(0.0),
        vitals["respiratory_rate"]
    ));
    out.push_str(&format!(
        "  History:     {}/{}{}\n",
        engine["history_len"],
        engine["history_capacity"],
        if engine["collecting"].as_bool().unwrap_or(false) {
            format!("  collecting ({} post samples)", engine["capture_len"])
        } else {
            String::new()
        }
    ));
    out.push_str(&format!(
        "  Detections:  {} thresholds, {} windows, {} aborted\n",
        stats["thresholds_detected"], stats["events_emitted"], stats["captures_aborted"]
    ));
    out.push_str(&format!(
        "  Analysis:    {} confirmed, {} not confirmed, {} failed, {} skipped\n",
        dispatch["confirmed"], dispatch["not_confirmed"], dispatch["failed"], dispatch["skipped_unworn"]
    ));
    out.push_str(&format!(
        "  Reports:     {} periodic, {} on demand, last POST {}\n",
        telemetry["periodic_cycles"], telemetry["on_demand_cycles"], last_http
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_summary() {
        let status = serde_json::json!({
            "lifecycle": "running",
            "uptime_secs": 42.4,
            "patient_id": "00001",
            "server_url": "http://10.0.0.2:5000/sensors",
            "push_connected": false,
            "worn": true,
            "engine": {
                "history_len": 680, "history_capacity": 680,
                "collecting": true, "capture_len": 12, "consecutive_high": 7,
                "stats": {"thresholds_detected": 1, "events_emitted": 0, "captures_aborted": 0}
            },
            "vitals": {
                "heart_rate": 72, "oxygen_saturation": 98, "systolic_pressure": 120,
                "diastolic_pressure": 80, "body_temperature": 36.64, "respiratory_rate": 16
            },
            "telemetry": {
                "periodic_cycles": 2, "on_demand_cycles": 1,
                "last_http": {"result": "delivered", "status": 200}
            },
            "dispatch": {"confirmed": 0, "not_confirmed": 0, "failed": 0, "skipped_unworn": 0}
        });
        let text = render(&status);
        assert!(text.starts_with("Agent running for patient 00001 (up 42s)"));
        assert!(text.contains("Worn:        yes    Push connected: no"));
        assert!(text.contains("hr 72  spo2 98  bp 120/80  temp 36.6  resp 16"));
        assert!(text.contains("680/680  collecting (12 post samples)"));
        assert!(text.contains("last POST delivered (200)"));
    }

    #[test]
    fn test_render_tolerates_missing_fields() {
        let text = render(&serde_json::json!({}));
        assert!(text.contains("Agent unknown"));
        assert!(text.contains("last POST none yet"));
    }
}
