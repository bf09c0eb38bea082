use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;

/// Minutes a job may sit in `MovedForProcessing` before the sweeper fails it.
pub const DEFAULT_STUCK_THRESHOLD_MINUTES: u64 = 240;

/// Minutes between sweeper runs.
pub const DEFAULT_SWEEP_INTERVAL_MINUTES: u64 = 60;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub log_format: LogFormat,
    pub queue: QueueConfig,
    pub status_sink: StatusSinkConfig,
    pub job_store: JobStoreConfig,
    pub report_store: ReportStoreConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    pub url: String,
    #[serde(default = "default_stream")]
    pub stream: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_consumer")]
    pub consumer: String,
}

fn default_stream() -> String {
    "CROSSLOAD".to_string()
}

fn default_subject() -> String {
    "crossload.completion".to_string()
}

fn default_consumer() -> String {
    "crossloader".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatusSinkConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobStoreConfig {
    pub connection_string: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportStoreConfig {
    pub backend: Backend,
    /// Fs: directory holding one subdirectory per container.
    /// Url: base URL understood by the object store resolver, e.g. s3://bucket.
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Fs,
    Memory,
    Url,
}

/// Sweep timings. Both fields accept an integer or a numeric string; a
/// missing or malformed value falls back to the documented default instead
/// of failing startup.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SweepConfig {
    #[serde(default, deserialize_with = "lenient_minutes")]
    stuck_threshold_minutes: Option<u64>,
    #[serde(default, deserialize_with = "lenient_minutes")]
    sweep_interval_minutes: Option<u64>,
}

impl SweepConfig {
    pub fn stuck_threshold_minutes(&self) -> u64 {
        self.stuck_threshold_minutes
            .unwrap_or(DEFAULT_STUCK_THRESHOLD_MINUTES)
    }

    pub fn sweep_interval_minutes(&self) -> u64 {
        self.sweep_interval_minutes
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_MINUTES)
    }
}

fn lenient_minutes<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
        Other(toml::Value),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(v)) if v >= 0 => Some(v as u64),
        Some(Raw::Str(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&data)?;
        Ok(cfg)
    }
}
