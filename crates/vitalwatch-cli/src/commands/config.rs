//! `vitalwatch config`: inspect and edit the persisted agent configuration.

use vitalwatch_core::{AgentConfig, validate_patient_id};

/// Keys accepted by `config set`.
const KEYS: &[&str] = &[
    "server_url",
    "server_ip",
    "patient_id",
    "push_address",
    "report_interval_secs",
    "align_to_wall_clock",
    "vitals_timeout_secs",
    "analysis_timeout_secs",
    "reconnect_delay_secs",
    "wear_status_interval_secs",
    "detection.buffer_size",
    "detection.post_threshold_size",
    "detection.magnitude_threshold",
    "detection.sustained_count",
];

pub fn show(path: Option<&str>) {
    let file = super::config_path(path);
    let config = super::load_config(path);
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
    println!();
    println!("  file:          {}", file.display());
    if !config.server_url.is_empty() {
        println!("  analysis url:  {}", config.analysis_url());
    }
    if let Err(e) = config.validate() {
        println!("  warning:       {e}");
    }
}

pub fn set(path: Option<&str>, key: &str, value: &str) {
    let file = super::config_path(path);
    let mut config = super::load_config(path);
    if let Err(e) = apply_setting(&mut config, key, value) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Err(e) = config.save(&file) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    println!("{key} = {value}  ({})", file.display());
    if let Err(e) = config.validate() {
        println!("warning: configuration incomplete: {e}");
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid value for {key}: '{value}'"))
}

/// Apply one `key = value` edit. Patient IDs, collector IPs and detection
/// settings are checked right away.
pub fn apply_setting(config: &mut AgentConfig, key: &str, value: &str) -> Result<(), String> {
    match key {
        "server_url" => config.server_url = value.trim().to_string(),
        "server_ip" => config.set_server_ip(value).map_err(|e| e.to_string())?,
        "patient_id" => {
            let id = value.trim();
            validate_patient_id(id).map_err(|e| e.to_string())?;
            config.patient_id = id.to_string();
        }
        "push_address" => {
            let v = value.trim();
            config.push_address = if v.is_empty() || v.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(v.to_string())
            };
        }
        "report_interval_secs" => config.report_interval_secs = parse(key, value)?,
        "align_to_wall_clock" => config.align_to_wall_clock = parse(key, value)?,
        "vitals_timeout_secs" => config.vitals_timeout_secs = parse(key, value)?,
        "analysis_timeout_secs" => config.analysis_timeout_secs = parse(key, value)?,
        "reconnect_delay_secs" => config.reconnect_delay_secs = parse(key, value)?,
        "wear_status_interval_secs" => config.wear_status_interval_secs = parse(key, value)?,
        "detection.buffer_size" => config.detection.buffer_size = parse(key, value)?,
        "detection.post_threshold_size" => {
            config.detection.post_threshold_size = parse(key, value)?;
        }
        "detection.magnitude_threshold" => {
            config.detection.magnitude_threshold = parse(key, value)?;
        }
        "detection.sustained_count" => config.detection.sustained_count = parse(key, value)?,
        _ => {
            return Err(format!(
                "unknown key '{key}'. Known keys: {}",
                KEYS.join(", ")
            ));
        }
    }
    if key.starts_with("detection.") {
        config.detection.validate().map_err(|e| e.to_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_key_is_settable() {
        let values = [
            ("server_url", "http://10.0.0.2:5000/sensors"),
            ("server_ip", "10.0.0.3"),
            ("patient_id", "00042"),
            ("push_address", "10.0.0.2:5001"),
            ("report_interval_secs", "60"),
            ("align_to_wall_clock", "false"),
            ("vitals_timeout_secs", "3"),
            ("analysis_timeout_secs", "20"),
            ("reconnect_delay_secs", "2"),
            ("wear_status_interval_secs", "30"),
            ("detection.buffer_size", "800"),
            ("detection.post_threshold_size", "400"),
            ("detection.magnitude_threshold", "45.5"),
            ("detection.sustained_count", "3"),
        ];
        assert_eq!(values.len(), KEYS.len());
        let mut config = AgentConfig::default();
        for (key, value) in values {
            apply_setting(&mut config, key, value).unwrap();
        }
        assert_eq!(config.patient_id, "00042");
        assert_eq!(config.server_url, "http://10.0.0.3:5000/sensors");
        assert_eq!(config.push_address.as_deref(), Some("10.0.0.2:5001"));
        assert!(!config.align_to_wall_clock);
        assert_eq!(config.detection.buffer_size, 800);
        assert_eq!(config.detection.magnitude_threshold, 45.5);
        config.validate().unwrap();
    }

    #[test]
    fn test_push_address_can_be_cleared() {
        let mut config = AgentConfig::default();
        apply_setting(&mut config, "push_address", "host:1").unwrap();
        apply_setting(&mut config, "push_address", "none").unwrap();
        assert!(config.push_address.is_none());
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut config = AgentConfig::default();
        assert!(apply_setting(&mut config, "colour", "blue").is_err());
        assert!(apply_setting(&mut config, "report_interval_secs", "often").is_err());
        assert!(apply_setting(&mut config, "patient_id", "bob smith").is_err());
        assert!(apply_setting(&mut config, "patient_id", "123").is_err());
        assert_eq!(config.patient_id, "00001");
        assert!(apply_setting(&mut config, "server_ip", "10.0.0.300").is_err());
        assert!(config.server_url.is_empty());
        // Post window larger than the whole buffer.
        assert!(apply_setting(&mut config, "detection.post_threshold_size", "5000").is_err());
    }

    #[test]
    fn test_set_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitalwatch.json");
        let path_str = path.to_str().unwrap();

        set(Some(path_str), "server_url", "http://10.0.0.2:5000/sensors");
        set(Some(path_str), "patient_id", "00099");

        let loaded = AgentConfig::load(&path).unwrap();
        assert_eq!(loaded.server_url, "http://10.0.0.2:5000/sensors");
        assert_eq!(loaded.patient_id, "00099");
        assert_eq!(loaded.report_interval_secs, 300);
    }
}
