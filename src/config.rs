use crate::camera::ffmpeg::DEFAULT_STREAM_CONTENT_TYPE;
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load environment variables from a `.env` file in the working directory.
///
/// Values may contain spaces without quoting. Variables already present in
/// the environment are left untouched.
pub fn load_dotenv() {
    let Ok(content) = fs::read_to_string(".env") else {
        return;
    };

    for (key, value) in parse_dotenv(&content) {
        if std::env::var(key).is_err() {
            // SAFETY: called from main before the runtime spawns any threads
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Parse `KEY=value` lines, skipping blanks and `#` comments.
fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (key.trim(), unquoted)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub vendor: VendorConfig,
    pub ffmpeg: FfmpegConfig,
    pub sensors: SensorConfig,
    pub mqtt: MqttConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorConfig {
    /// JSON dump of the REST systems response, re-read on every refresh.
    pub snapshot_path: PathBuf,
    /// Websocket URL of the push channel; push events are disabled when unset.
    pub push_url: Option<String>,
    /// Overrides the token found in the snapshot.
    pub access_token: Option<String>,
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FfmpegConfig {
    pub binary: String,
    pub grab_timeout_secs: u64,
    pub stream_content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Time motion and doorbell sensors stay on after an event.
    pub clear_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            grab_timeout_secs: 10,
            stream_content_type: DEFAULT_STREAM_CONTENT_TYPE.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vendor: VendorConfig {
                snapshot_path: default_snapshot_path(),
                push_url: None,
                access_token: None,
                refresh_interval_secs: 30,
            },
            ffmpeg: FfmpegConfig::default(),
            sensors: SensorConfig {
                clear_delay_secs: 30,
            },
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "simplisafe-bridge".to_string(),
                username: None,
                password: None,
                topic_prefix: "simplisafe".to_string(),
            },
        }
    }
}

/// `$XDG_CONFIG_HOME/simplisafe-bridge/systems.json`, or the working
/// directory when no config dir is known.
fn default_snapshot_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("simplisafe-bridge"))
        .unwrap_or_default()
        .join("systems.json")
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from defaults overridden by `lookup`.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.parse::<u64>().ok());

        // Vendor
        if let Some(path) = lookup("SIMPLISAFE_SNAPSHOT") {
            config.vendor.snapshot_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("SIMPLISAFE_PUSH_URL") {
            config.vendor.push_url = Some(url);
        }
        if let Some(token) = lookup("SIMPLISAFE_ACCESS_TOKEN") {
            config.vendor.access_token = Some(token);
        }
        if let Some(secs) = parsed("SIMPLISAFE_REFRESH_INTERVAL") {
            config.vendor.refresh_interval_secs = secs;
        }

        // FFmpeg
        if let Some(binary) = lookup("FFMPEG_BINARY") {
            config.ffmpeg.binary = binary;
        }
        if let Some(secs) = parsed("FFMPEG_GRAB_TIMEOUT") {
            config.ffmpeg.grab_timeout_secs = secs;
        }

        // Sensors
        if let Some(secs) = parsed("SENSOR_CLEAR_DELAY") {
            config.sensors.clear_delay_secs = secs;
        }

        // MQTT
        if let Some(host) = lookup("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Some(port) = lookup("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Some(client_id) = lookup("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Some(username) = lookup("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Some(password) = lookup("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }
        if let Some(prefix) = lookup("MQTT_TOPIC_PREFIX") {
            config.mqtt.topic_prefix = prefix;
        }

        config
    }

    /// Reject settings the daemon cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.ffmpeg.binary.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "FFMPEG_BINARY must not be empty".to_string(),
            ));
        }
        if self.ffmpeg.grab_timeout_secs == 0 {
            return Err(BridgeError::InvalidConfig(
                "FFMPEG_GRAB_TIMEOUT must be at least 1 second".to_string(),
            ));
        }
        if let Some(url) = &self.vendor.push_url
            && !(url.starts_with("ws://") || url.starts_with("wss://"))
        {
            return Err(BridgeError::InvalidConfig(format!(
                "SIMPLISAFE_PUSH_URL must be a ws:// or wss:// URL, got {}",
                url
            )));
        }

        let prefix = &self.mqtt.topic_prefix;
        if prefix.is_empty() || prefix.contains(['+', '#']) {
            return Err(BridgeError::InvalidConfig(format!(
                "MQTT_TOPIC_PREFIX must be non-empty without wildcards, got {:?}",
                prefix
            )));
        }
        if self.mqtt.username.is_some() != self.mqtt.password.is_some() {
            return Err(BridgeError::InvalidConfig(
                "MQTT_USERNAME and MQTT_PASSWORD must be set together".to_string(),
            ));
        }

        Ok(())
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.vendor.snapshot_path
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.vendor.refresh_interval_secs.max(1))
    }

    pub fn clear_delay(&self) -> Duration {
        Duration::from_secs(self.sensors.clear_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.clear_delay(), Duration::from_secs(30));
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.ffmpeg.binary, "ffmpeg");
        assert_eq!(config.mqtt.topic_prefix, "simplisafe");
        assert!(config.vendor.push_url.is_none());
        assert!(config.snapshot_path().ends_with("systems.json"));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SIMPLISAFE_SNAPSHOT", "/var/lib/ss/systems.json"),
            ("SIMPLISAFE_PUSH_URL", "wss://push.example/events"),
            ("SENSOR_CLEAR_DELAY", "45"),
            ("FFMPEG_BINARY", "/usr/bin/ffmpeg"),
            ("MQTT_BROKER_PORT", "8883"),
        ]));
        assert_eq!(
            config.snapshot_path(),
            Path::new("/var/lib/ss/systems.json")
        );
        assert_eq!(
            config.vendor.push_url.as_deref(),
            Some("wss://push.example/events")
        );
        assert_eq!(config.clear_delay(), Duration::from_secs(45));
        assert_eq!(config.ffmpeg.binary, "/usr/bin/ffmpeg");
        assert_eq!(config.mqtt.broker_port, 8883);
    }

    #[test]
    fn test_invalid_numbers_keep_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("SENSOR_CLEAR_DELAY", "soon"),
            ("MQTT_BROKER_PORT", "99999"),
        ]));
        assert_eq!(config.sensors.clear_delay_secs, 30);
        assert_eq!(config.mqtt.broker_port, 1883);
    }

    #[test]
    fn test_validate_defaults() {
        assert!(Config::from_lookup(lookup(&[])).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        for vars in [
            [("FFMPEG_BINARY", "")],
            [("FFMPEG_GRAB_TIMEOUT", "0")],
            [("SIMPLISAFE_PUSH_URL", "https://push.example/events")],
            [("MQTT_TOPIC_PREFIX", "home/#")],
            [("MQTT_USERNAME", "bridge")],
        ] {
            let err = Config::from_lookup(lookup(&vars)).validate().unwrap_err();
            assert!(
                matches!(err, BridgeError::InvalidConfig(_)),
                "{:?} should be rejected",
                vars
            );
        }
    }

    #[test]
    fn test_parse_dotenv() {
        let parsed = parse_dotenv(
            "# comment\n\nMQTT_BROKER_HOST=10.0.0.2\n\
             NAME = Front Door\nTOKEN=\"abc def\"\nbroken line\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("MQTT_BROKER_HOST", "10.0.0.2"),
                ("NAME", "Front Door"),
                ("TOKEN", "abc def"),
            ]
        );
    }
}
