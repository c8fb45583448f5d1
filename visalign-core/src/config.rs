//! Configuration for visual alignment

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Network endpoint of the robot controller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Pauses after a continuous-mode cycle completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    /// Pause before the second stop signal
    pub first_ms: u64,
    /// Pause before the next frame is evaluated
    pub second_ms: u64,
}

impl SettleDelays {
    pub fn first(&self) -> Duration {
        Duration::from_millis(self.first_ms)
    }

    pub fn second(&self) -> Duration {
        Duration::from_millis(self.second_ms)
    }

    pub fn total(&self) -> Duration {
        self.first() + self.second()
    }
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            first_ms: 1000,
            second_ms: 3000,
        }
    }
}

/// Robot and tracking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Robot controller host
    #[serde(alias = "IP_ROBOT")]
    pub robot_host: String,
    /// Robot controller port
    #[serde(alias = "PORT")]
    pub robot_port: u16,
    /// Detector label of the primary object; `None` disables x/y alignment
    #[serde(alias = "MAIN_LABEL", with = "label")]
    pub primary_label: Option<String>,
    /// Detector label of the secondary (head) object; `None` disables rz
    #[serde(alias = "HEAD_LABEL", with = "label")]
    pub secondary_label: Option<String>,
    /// Whether camera frames are rotated by 180 degrees before detection
    #[serde(alias = "FLIP_IMAGE")]
    pub flip_image: bool,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Vertical tolerance between head and body, in pixels
    pub head_tolerance_px: i32,
    pub settle: SettleDelays,
    /// Keys owned by other collaborators (detector model, camera index)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            robot_host: "192.168.201.1".to_string(),
            robot_port: 6601,
            primary_label: Some("grey".to_string()),
            secondary_label: Some("head".to_string()),
            flip_image: true,
            connect_timeout_ms: 3000,
            head_tolerance_px: 1,
            settle: SettleDelays::default(),
            extra: BTreeMap::new(),
        }
    }
}

impl RobotConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.robot_host.trim().is_empty() {
            return Err(Error::Configuration("robot_host must not be empty".to_string()));
        }

        if self.robot_port == 0 {
            return Err(Error::Configuration("robot_port must be greater than 0".to_string()));
        }

        if self.connect_timeout_ms == 0 {
            return Err(Error::Configuration(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.head_tolerance_px < 0 {
            return Err(Error::Configuration(
                "head_tolerance_px must not be negative".to_string(),
            ));
        }

        for (name, label) in [
            ("primary_label", &self.primary_label),
            ("secondary_label", &self.secondary_label),
        ] {
            if matches!(label, Some(l) if l.trim().is_empty()) {
                return Err(Error::Configuration(format!(
                    "{} must not be blank; omit it to disable that target",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.robot_host.clone(), self.robot_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn parse(text: &str, format: ConfigFormat) -> Result<Self> {
        match format {
            ConfigFormat::Json => Ok(serde_json::from_str(text)?),
            ConfigFormat::Toml => Ok(toml::from_str(text)?),
        }
    }

    pub fn render(&self, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            ConfigFormat::Toml => Ok(toml::to_string_pretty(self)?),
        }
    }
}

/// Labels are written as strings; a blank string means "no target"
mod label {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(label: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(label.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|label| !label.trim().is_empty()))
    }
}

/// On-disk configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a file extension; anything but `.toml` is JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}
