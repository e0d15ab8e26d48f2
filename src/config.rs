use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap, fs::File, io::BufReader, path::Path, path::PathBuf, time::Duration,
};
use thiserror::Error;

use crate::eval::value::{Rotation, Vector};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Iterations a single loop may run, and backward jumps a single body may
    /// take, before it is aborted with a warning.
    #[serde(default = "default_loop_iteration_cap")]
    pub loop_iteration_cap: u64,

    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,

    /// Pending normal-priority events beyond this are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_idle_poll_interval", with = "duration_ms")]
    pub idle_poll_interval: Duration,

    #[serde(default = "default_shutdown_timeout", with = "duration_ms")]
    pub shutdown_timeout: Duration,

    #[serde(default)]
    pub clear_listeners_on_state_change: bool,

    #[serde(default)]
    pub object: ObjectConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default = "default_dataserver_delay", with = "duration_ms")]
    pub dataserver_delay: Duration,

    /// Notecard name -> lines.
    #[serde(default)]
    pub notecards: HashMap<String, Vec<String>>,

    /// Directory searched for `<name>` / `<name>.txt` notecards not listed above.
    #[serde(default)]
    pub notecard_dir: Option<PathBuf>,

    #[serde(default)]
    pub sensor: SensorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectConfig {
    #[serde(default = "default_object_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Generated when absent.
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub owner_key: Option<String>,

    #[serde(default = "default_owner_name")]
    pub owner_name: String,

    #[serde(default = "default_position")]
    pub position: Vector,

    #[serde(default)]
    pub rotation: Rotation,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_script_name")]
    pub script_name: String,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            name: default_object_name(),
            description: String::new(),
            key: None,
            owner_key: None,
            owner_name: default_owner_name(),
            position: default_position(),
            rotation: Rotation::IDENTITY,
            region: default_region(),
            script_name: default_script_name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HttpMode {
    /// Answer from configured stubs without touching the network.
    #[default]
    Stub,
    Live,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub mode: HttpMode,

    #[serde(default = "default_http_timeout", with = "duration_ms")]
    pub timeout: Duration,

    #[serde(default = "default_stub_latency", with = "duration_ms")]
    pub stub_latency: Duration,

    /// URL -> canned response, used in stub mode.
    #[serde(default)]
    pub stubs: HashMap<String, HttpStub>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            mode: HttpMode::default(),
            timeout: default_http_timeout(),
            stub_latency: default_stub_latency(),
            stubs: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpStub {
    #[serde(default = "default_http_status")]
    pub status: i32,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "default_sensor_max_results")]
    pub max_results: usize,

    /// Entities present in the simulated region at start.
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            max_results: default_sensor_max_results(),
            entities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub key: Option<String>,
    /// `AGENT`, `ACTIVE`, `PASSIVE`, `SCRIPTED` bit mask.
    #[serde(default = "default_entity_type")]
    pub entity_type: i32,
    #[serde(default = "default_position")]
    pub position: Vector,
}

fn default_loop_iteration_cap() -> u64 {
    1_000_000
}
fn default_max_call_depth() -> usize {
    256
}
fn default_queue_capacity() -> usize {
    64
}
fn default_idle_poll_interval() -> Duration {
    Duration::from_millis(5)
}
fn default_shutdown_timeout() -> Duration {
    Duration::from_millis(1000)
}
fn default_dataserver_delay() -> Duration {
    Duration::from_millis(10)
}
fn default_object_name() -> String {
    "Object".to_string()
}
fn default_owner_name() -> String {
    "Owner".to_string()
}
fn default_position() -> Vector {
    Vector::new(128.0, 128.0, 20.0)
}
fn default_region() -> String {
    "Sandbox".to_string()
}
fn default_script_name() -> String {
    "New Script".to_string()
}
fn default_http_timeout() -> Duration {
    Duration::from_secs(60)
}
fn default_stub_latency() -> Duration {
    Duration::from_millis(5)
}
fn default_http_status() -> i32 {
    200
}
fn default_sensor_max_results() -> usize {
    16
}
fn default_entity_type() -> i32 {
    1
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loop_iteration_cap: default_loop_iteration_cap(),
            max_call_depth: default_max_call_depth(),
            queue_capacity: default_queue_capacity(),
            idle_poll_interval: default_idle_poll_interval(),
            shutdown_timeout: default_shutdown_timeout(),
            clear_listeners_on_state_change: false,
            object: ObjectConfig::default(),
            http: HttpConfig::default(),
            dataserver_delay: default_dataserver_delay(),
            notecards: HashMap::new(),
            notecard_dir: None,
            sensor: SensorConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }
}
