//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Bounds for the detection window (seconds); out-of-range values are
/// clamped at load time
pub const DETECTION_WINDOW_MIN: i64 = 30;
pub const DETECTION_WINDOW_MAX: i64 = 600;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub token: String,
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.nuki.io".to_string()
}

fn default_api_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Seconds between poll cycles for each lock
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
    /// How many activity log entries to fetch per cycle
    #[serde(default = "default_log_limit")]
    pub log_limit: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: default_poll_interval_secs(), log_limit: default_log_limit() }
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_log_limit() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Maximum age (seconds) for a log record to still produce an event
    #[serde(default = "default_detection_window_seconds")]
    pub window_seconds: i64,
    /// Static identity hints: "source_N" -> display name
    #[serde(default)]
    pub fingerprint_user_mapping: HashMap<String, String>,
    /// Verbosity only; no behavioral effect
    #[serde(default)]
    pub enhanced_logging: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_detection_window_seconds(),
            fingerprint_user_mapping: HashMap::new(),
            enhanced_logging: false,
        }
    }
}

fn default_detection_window_seconds() -> i64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct EgressConfig {
    /// File path for attributed events (JSONL format)
    #[serde(default = "default_egress_file")]
    pub file: String,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self { file: default_egress_file() }
    }
}

fn default_egress_file() -> String {
    "events.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttEgressConfig {
    /// Enable MQTT egress publishing
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Topic for keypad access events (QoS 1)
    #[serde(default = "default_keypad_topic")]
    pub keypad_topic: String,
    /// Topic for manual operation events (QoS 0)
    #[serde(default = "default_manual_topic")]
    pub manual_topic: String,
}

impl Default for MqttEgressConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            keypad_topic: default_keypad_topic(),
            manual_topic: default_manual_topic(),
        }
    }
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_keypad_topic() -> String {
    "lockwatch/keypad".to_string()
}

fn default_manual_topic() -> String {
    "lockwatch/manual".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between metric summary log lines
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_metrics_interval_secs(),
            prometheus_port: default_prometheus_port(),
        }
    }
}

fn default_metrics_interval_secs() -> u64 {
    60
}

fn default_prometheus_port() -> u16 {
    9090
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub egress: EgressConfig,
    #[serde(default)]
    pub mqtt_egress: MqttEgressConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    api_token: String,
    api_base_url: String,
    api_timeout_secs: u64,
    poll_interval_secs: u64,
    log_limit: u32,
    detection_window_seconds: i64,
    fingerprint_user_mapping: HashMap<String, String>,
    enhanced_logging: bool,
    egress_file: String,
    mqtt_egress_enabled: bool,
    mqtt_host: String,
    mqtt_port: u16,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    mqtt_keypad_topic: String,
    mqtt_manual_topic: String,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            api_base_url: default_api_base_url(),
            api_timeout_secs: default_api_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            log_limit: default_log_limit(),
            detection_window_seconds: default_detection_window_seconds(),
            fingerprint_user_mapping: HashMap::new(),
            enhanced_logging: false,
            egress_file: default_egress_file(),
            mqtt_egress_enabled: false,
            mqtt_host: default_mqtt_host(),
            mqtt_port: default_mqtt_port(),
            mqtt_username: None,
            mqtt_password: None,
            mqtt_keypad_topic: default_keypad_topic(),
            mqtt_manual_topic: default_manual_topic(),
            metrics_interval_secs: default_metrics_interval_secs(),
            prometheus_port: default_prometheus_port(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        // Check for --config argument
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        // Check CONFIG_FILE environment variable
        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        // Default to dev.toml
        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let window_seconds = clamp_detection_window(toml_config.detection.window_seconds);

        Ok(Self {
            api_token: toml_config.api.token,
            api_base_url: toml_config.api.base_url,
            api_timeout_secs: toml_config.api.timeout_secs,
            poll_interval_secs: toml_config.poll.interval_secs,
            log_limit: toml_config.poll.log_limit,
            detection_window_seconds: window_seconds,
            fingerprint_user_mapping: toml_config.detection.fingerprint_user_mapping,
            enhanced_logging: toml_config.detection.enhanced_logging,
            egress_file: toml_config.egress.file,
            mqtt_egress_enabled: toml_config.mqtt_egress.enabled,
            mqtt_host: toml_config.mqtt_egress.host,
            mqtt_port: toml_config.mqtt_egress.port,
            mqtt_username: toml_config.mqtt_egress.username,
            mqtt_password: toml_config.mqtt_egress.password,
            mqtt_keypad_topic: toml_config.mqtt_egress.keypad_topic,
            mqtt_manual_topic: toml_config.mqtt_egress.manual_topic,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            prometheus_port: toml_config.metrics.prometheus_port,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(args: &[String]) -> Self {
        let config_path = Self::resolve_config_path(args);

        match Self::from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_timeout_secs(&self) -> u64 {
        self.api_timeout_secs
    }

    pub fn poll_interval_secs(&self) -> u64 {
        self.poll_interval_secs
    }

    pub fn log_limit(&self) -> u32 {
        self.log_limit
    }

    pub fn detection_window_seconds(&self) -> i64 {
        self.detection_window_seconds
    }

    pub fn fingerprint_user_mapping(&self) -> &HashMap<String, String> {
        &self.fingerprint_user_mapping
    }

    pub fn enhanced_logging(&self) -> bool {
        self.enhanced_logging
    }

    pub fn egress_file(&self) -> &str {
        &self.egress_file
    }

    pub fn mqtt_egress_enabled(&self) -> bool {
        self.mqtt_egress_enabled
    }

    pub fn mqtt_host(&self) -> &str {
        &self.mqtt_host
    }

    pub fn mqtt_port(&self) -> u16 {
        self.mqtt_port
    }

    pub fn mqtt_username(&self) -> Option<&str> {
        self.mqtt_username.as_deref()
    }

    pub fn mqtt_password(&self) -> Option<&str> {
        self.mqtt_password.as_deref()
    }

    pub fn mqtt_keypad_topic(&self) -> &str {
        &self.mqtt_keypad_topic
    }

    pub fn mqtt_manual_topic(&self) -> &str {
        &self.mqtt_manual_topic
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the detection window
    #[cfg(test)]
    pub fn with_detection_window_seconds(mut self, seconds: i64) -> Self {
        self.detection_window_seconds = seconds;
        self
    }

    /// Builder method for tests to set the fingerprint user mapping
    #[cfg(test)]
    pub fn with_fingerprint_user_mapping(mut self, mapping: HashMap<String, String>) -> Self {
        self.fingerprint_user_mapping = mapping;
        self
    }
}

/// Clamp the detection window to its supported range
fn clamp_detection_window(seconds: i64) -> i64 {
    if seconds < DETECTION_WINDOW_MIN {
        eprintln!(
            "Warning: detection window {}s below minimum, clamping to {}s",
            seconds, DETECTION_WINDOW_MIN
        );
        DETECTION_WINDOW_MIN
    } else if seconds > DETECTION_WINDOW_MAX {
        eprintln!(
            "Warning: detection window {}s above maximum, clamping to {}s",
            seconds, DETECTION_WINDOW_MAX
        );
        DETECTION_WINDOW_MAX
    } else {
        seconds
    }
}
