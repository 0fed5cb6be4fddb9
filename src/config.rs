use anyhow::Result;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: String,
    pub mqtt_keepalive_secs: u64,
    /// Topic carrying single current-reading snapshots.
    pub current_topic: String,
    /// Topics carrying bulk history trees. Deployments vary between the
    /// namespaced tree and a legacy top-level one, so both are watched.
    pub history_topics: Vec<String>,
    /// Slot the derived alarm boolean is written back to.
    pub alarm_topic: String,
    pub state_dir: PathBuf,
    pub status_log_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let mqtt_host = env::var("FIRELY_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = env::var("FIRELY_MQTT_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(1883);
        let mqtt_username = env::var("FIRELY_MQTT_USERNAME").ok();
        let mqtt_password = env::var("FIRELY_MQTT_PASSWORD").ok();
        let mqtt_client_id = env::var("FIRELY_MQTT_CLIENT_ID")
            .unwrap_or_else(|_| format!("firely-reconciler-{}", std::process::id()));
        let mqtt_keepalive_secs = env::var("FIRELY_MQTT_KEEPALIVE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let current_topic =
            env::var("FIRELY_CURRENT_TOPIC").unwrap_or_else(|_| "sensors/current".to_string());
        let history_topics = env::var("FIRELY_HISTORY_TOPICS")
            .unwrap_or_else(|_| "sensors/history,history".to_string())
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect::<Vec<_>>();
        let alarm_topic =
            env::var("FIRELY_ALARM_TOPIC").unwrap_or_else(|_| "sensorData/alarmOn".to_string());

        let state_dir = env::var("FIRELY_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/var/lib/firely-reconciler"));
        let status_log_secs = env::var("FIRELY_STATUS_LOG_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        Ok(Self {
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_client_id,
            mqtt_keepalive_secs,
            current_topic,
            history_topics,
            alarm_topic,
            state_dir,
            status_log_secs,
        })
    }

    pub fn mqtt_keepalive(&self) -> Duration {
        Duration::from_secs(self.mqtt_keepalive_secs)
    }

    pub fn status_log_interval(&self) -> Duration {
        Duration::from_secs(self.status_log_secs.max(1))
    }
}
