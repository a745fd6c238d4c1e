use plant_client::domain::PlantDefinition;
use serde::Deserialize;
use std::{fs, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub kind: StoreKind,
    #[serde(default)]
    pub uri: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
    /// Offset used for every timestamp shown to clients (UTC+05:30 by default).
    #[serde(default = "default_presentation_offset")]
    pub presentation_utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_freshness_window_secs")]
    pub freshness_window_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: default_freshness_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: u64,
    #[serde(default = "default_bucket_width_secs")]
    pub bucket_width_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            lookback_secs: default_lookback_secs(),
            bucket_width_secs: default_bucket_width_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_horizon_secs")]
    pub horizon_secs: u64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            horizon_secs: default_horizon_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    pub metrics: Option<MetricsConfig>,
    pub plants: Vec<PlantDefinition>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("TELEMETRY_CONFIG").unwrap_or_else(|_| "telemetry-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let windows = [
            ("status.freshness_window_secs", self.status.freshness_window_secs),
            ("history.lookback_secs", self.history.lookback_secs),
            ("history.bucket_width_secs", self.history.bucket_width_secs),
            ("retention.horizon_secs", self.retention.horizon_secs),
        ];
        for (name, value) in windows {
            if value > MAX_WINDOW_SECS {
                anyhow::bail!("{name} = {value} exceeds the maximum of {MAX_WINDOW_SECS} seconds");
            }
        }
        if self.history.bucket_width_secs == 0 {
            anyhow::bail!("history.bucket_width_secs must be at least 1");
        }
        Ok(())
    }
}

impl StoreConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl StatusConfig {
    pub fn freshness_window(&self) -> time::Duration {
        secs(self.freshness_window_secs)
    }
}

impl HistoryConfig {
    pub fn lookback(&self) -> time::Duration {
        secs(self.lookback_secs)
    }

    pub fn bucket_width(&self) -> time::Duration {
        secs(self.bucket_width_secs)
    }
}

impl RetentionConfig {
    pub fn horizon(&self) -> time::Duration {
        secs(self.horizon_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl HttpConfig {
    pub fn presentation_offset(&self) -> anyhow::Result<time::UtcOffset> {
        time::UtcOffset::from_whole_seconds(self.presentation_utc_offset_minutes * 60)
            .map_err(|e| anyhow::anyhow!("invalid http.presentation_utc_offset_minutes: {e}"))
    }
}

/// Upper bound for configured time windows: one hundred years.
const MAX_WINDOW_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// `now - span`, clamped to the earliest representable instant.
pub(crate) fn saturating_before(now: time::OffsetDateTime, span: time::Duration) -> time::OffsetDateTime {
    now.checked_sub(span)
        .unwrap_or_else(|| time::PrimitiveDateTime::MIN.assume_utc())
}

pub(crate) fn secs(value: u64) -> time::Duration {
    time::Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

fn default_max_connections() -> u32 {
    8
}

fn default_max_write_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_presentation_offset() -> i32 {
    330
}

fn default_freshness_window_secs() -> u64 {
    120
}

fn default_lookback_secs() -> u64 {
    7 * 60 * 60
}

fn default_bucket_width_secs() -> u64 {
    60
}

fn default_horizon_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_interval_secs() -> u64 {
    24 * 60 * 60
}
