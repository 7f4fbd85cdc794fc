use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{ArgAction, Parser, ValueEnum};
use serde::Deserialize;
use serde_json::Value;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime, Time, UtcOffset,
};

use crate::{
    chunk::{chunk_range, Chunk, END_OF_DAY, MAX_DAYS_PER_CHUNK},
    generate::{parse_specs, Distribution, EventsPerDay, PropertySpecs, DEFAULT_FIXED_TIME},
    retry::PollPolicy,
};

pub const DEFAULT_CUSTOMER_ID: &str = "hover_demo_customer";
pub const DEFAULT_BATCH_SIZE: usize = 400;
pub const DEFAULT_EVENTS_PER_DAY: u32 = 100;

const FIXED_TIME_POLL_ATTEMPTS: u32 = 60;
const EVEN_SPREAD_POLL_ATTEMPTS: u32 = 30;
const EVEN_SPREAD_BATCH_PAUSE_MS: u64 = 5_000;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("event_name is required")]
    MissingEventName,
    #[error("start_date and end_date are required")]
    MissingDateRange,
    #[error("invalid {field}: {value:?}")]
    InvalidDate { field: &'static str, value: String },
    #[error("start ({start}) is after end ({end})")]
    InvertedRange { start: OffsetDateTime, end: OffsetDateTime },
    #[error("invalid fixed time of day: {0:?}")]
    InvalidFixedTime(String),
    #[error("batch size must be at least 1")]
    InvalidBatchSize,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse job config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("neither ORB_API_KEY nor ORB_API_TOKEN environment variable is set")]
    MissingCredential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    FixedTime,
    EvenSpread,
}

/// Synthesize usage events and load them through the billing provider's
/// backfill workflow.
#[derive(Debug, Parser)]
#[command(name = "orb-backfill", version, about, long_about = None)]
pub struct Cli {
    /// JSON job config; when present it supplies the job parameters.
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_CUSTOMER_ID)]
    pub external_customer_id: String,

    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    #[arg(long)]
    pub start_date: Option<String>,

    /// `YYYY-MM-DD` (whole day, inclusive) or an RFC 3339 timestamp.
    #[arg(long)]
    pub end_date: Option<String>,

    #[arg(long, visible_alias = "event-type")]
    pub event_name: Option<String>,

    /// Exact number of events per day.
    #[arg(long, default_value_t = DEFAULT_EVENTS_PER_DAY)]
    pub num_events: u32,

    /// Lower bound of a random per-day count; pair with --max-events.
    #[arg(long, requires = "max_events")]
    pub min_events: Option<u32>,

    #[arg(long, requires = "min_events")]
    pub max_events: Option<u32>,

    /// JSON object of property specs.
    #[arg(long, default_value = "{}")]
    pub event_properties: String,

    /// Prefix for generated idempotency keys.
    #[arg(long)]
    pub job_id: Option<String>,

    #[arg(long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    pub replace_existing_events: bool,

    #[arg(long, value_enum)]
    pub distribution: Option<DistributionKind>,

    /// Time of day used by the fixed-time distribution.
    #[arg(long)]
    pub fixed_time: Option<String>,

    /// Generate and summarize events without calling the provider.
    #[arg(long)]
    pub dry_run: bool,
}

/// Runtime knobs that are not part of a job: endpoint, timeouts, polling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub max_days_per_chunk: u32,
    pub poll_interval_secs: u64,
    /// Defaults to 60 for fixed-time jobs and 30 for even-spread jobs.
    pub poll_max_attempts: Option<u32>,
    /// Defaults to 5s for even-spread jobs and none for fixed-time jobs.
    pub batch_pause_ms: Option<u64>,
    pub reconcile_interval_secs: u64,
    pub reconcile_max_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: orb_client::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 60,
            max_days_per_chunk: MAX_DAYS_PER_CHUNK,
            poll_interval_secs: 5,
            poll_max_attempts: None,
            batch_pause_ms: None,
            reconcile_interval_secs: 5,
            reconcile_max_attempts: 120,
        }
    }
}

impl Settings {
    /// Read `ORB_BACKFILL_SETTINGS` (TOML) when set, then apply `ORB_API_URL`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match env::var("ORB_BACKFILL_SETTINGS") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(url) = env::var("ORB_API_URL") {
            if !url.is_empty() {
                settings.api_url = url;
            }
        }
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Credential for the billing provider.
pub fn api_key_from_env() -> Result<String, ConfigError> {
    ["ORB_API_KEY", "ORB_API_TOKEN"]
        .iter()
        .filter_map(|k| env::var(k).ok())
        .find(|v| !v.is_empty())
        .ok_or(ConfigError::MissingCredential)
}

/// Fully resolved parameters for one run. Built once at startup and only
/// ever borrowed afterwards.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub job_id: Option<String>,
    pub event_name: String,
    pub external_customer_id: String,
    /// Inclusive, UTC, whole seconds.
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub events_per_day: EventsPerDay,
    pub distribution: Distribution,
    pub properties: PropertySpecs,
    pub replace_existing_events: bool,
    pub batch_size: usize,
    pub settings: Settings,
}

impl JobConfig {
    pub fn resolve(cli: &Cli, settings: Settings) -> Result<Self, ConfigError> {
        let raw = match &cli.config_file {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading job config");
                let mut raw = RawJobConfig::from_file(path)?;
                raw.job_id = raw.job_id.or_else(|| cli.job_id.clone());
                raw
            }
            None => RawJobConfig::from_cli(cli),
        };

        raw.into_job(cli.batch_size, settings)
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        chunk_range(self.start, self.end, self.settings.max_days_per_chunk)
    }

    pub fn status_poll(&self) -> PollPolicy {
        let default_attempts = match self.distribution {
            Distribution::FixedTime(_) => FIXED_TIME_POLL_ATTEMPTS,
            Distribution::EvenSpread => EVEN_SPREAD_POLL_ATTEMPTS,
        };
        PollPolicy::new(
            self.settings.poll_max_attempts.unwrap_or(default_attempts),
            Duration::from_secs(self.settings.poll_interval_secs),
        )
    }

    pub fn reconcile_poll(&self) -> PollPolicy {
        PollPolicy::new(
            self.settings.reconcile_max_attempts,
            Duration::from_secs(self.settings.reconcile_interval_secs),
        )
    }

    pub fn batch_pause(&self) -> Duration {
        let default_ms = match self.distribution {
            Distribution::FixedTime(_) => 0,
            Distribution::EvenSpread => EVEN_SPREAD_BATCH_PAUSE_MS,
        };
        Duration::from_millis(self.settings.batch_pause_ms.unwrap_or(default_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum RawEventsPerDay {
    Count(u32),
    Range {
        #[serde(default = "default_range_min")]
        min: u32,
        #[serde(default = "default_range_max")]
        max: u32,
    },
}

fn default_range_min() -> u32 {
    1
}

fn default_range_max() -> u32 {
    10
}

/// Job config as written by the caller, before defaults and validation.
/// Extra fields (e.g. `test_mode`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawJobConfig {
    #[serde(rename = "jobId")]
    job_id: Option<String>,
    event_name: Option<String>,
    external_customer_id: Option<String>,
    backfill_customer_id: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    events_per_day: Option<RawEventsPerDay>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
    replace_existing_events: Option<bool>,
    distribution: Option<DistributionKind>,
    fixed_time: Option<String>,
}

impl RawJobConfig {
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Accepts the job either flat or nested under `config`, with `jobId`
    /// at the root or inside `config`.
    pub(crate) fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        let root: Value = serde_json::from_str(contents)?;

        if let Some(inner) = root.get("config").filter(|v| v.is_object()) {
            let mut raw: RawJobConfig = serde_json::from_value(inner.clone())?;
            if let Some(id) = root.get("jobId").and_then(Value::as_str) {
                raw.job_id = Some(id.to_string());
            }
            return Ok(raw);
        }

        serde_json::from_value(root)
    }

    fn from_cli(cli: &Cli) -> Self {
        let properties = match serde_json::from_str::<BTreeMap<String, Value>>(&cli.event_properties) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse --event-properties, using none");
                BTreeMap::new()
            }
        };

        let events_per_day = match (cli.min_events, cli.max_events) {
            (Some(min), Some(max)) => RawEventsPerDay::Range { min, max },
            _ => RawEventsPerDay::Count(cli.num_events),
        };

        Self {
            job_id: cli.job_id.clone(),
            event_name: cli.event_name.clone(),
            external_customer_id: Some(cli.external_customer_id.clone()),
            backfill_customer_id: None,
            start_date: cli.start_date.clone(),
            end_date: cli.end_date.clone(),
            events_per_day: Some(events_per_day),
            properties,
            replace_existing_events: Some(cli.replace_existing_events),
            distribution: cli.distribution,
            fixed_time: cli.fixed_time.clone(),
        }
    }

    pub(crate) fn into_job(self, batch_size: usize, settings: Settings) -> Result<JobConfig, ConfigError> {
        let event_name = self
            .event_name
            .filter(|n| !n.trim().is_empty())
            .ok_or(ConfigError::MissingEventName)?;

        let (start_raw, end_raw) = match (self.start_date, self.end_date) {
            (Some(s), Some(e)) if !s.trim().is_empty() && !e.trim().is_empty() => (s, e),
            _ => return Err(ConfigError::MissingDateRange),
        };

        if batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }

        let external_customer_id = self
            .backfill_customer_id
            .filter(|c| !c.is_empty())
            .or(self.external_customer_id.filter(|c| !c.is_empty()))
            .unwrap_or_else(|| DEFAULT_CUSTOMER_ID.to_string());

        let events_per_day = match self
            .events_per_day
            .unwrap_or(RawEventsPerDay::Count(DEFAULT_EVENTS_PER_DAY))
        {
            RawEventsPerDay::Count(n) => EventsPerDay::Exact(n),
            RawEventsPerDay::Range { min, max } => EventsPerDay::Range { min, max },
        };

        let kind = self.distribution.unwrap_or(match events_per_day {
            EventsPerDay::Range { .. } => DistributionKind::FixedTime,
            EventsPerDay::Exact(_) => DistributionKind::EvenSpread,
        });
        let distribution = match kind {
            DistributionKind::FixedTime => {
                let at = match self.fixed_time.as_deref() {
                    Some(s) => parse_time_of_day(s)?,
                    None => DEFAULT_FIXED_TIME,
                };
                Distribution::FixedTime(at)
            }
            DistributionKind::EvenSpread => Distribution::EvenSpread,
        };

        let mut start = parse_bound(&start_raw, "start_date", RangeEdge::Start)?;
        let mut end = parse_bound(&end_raw, "end_date", RangeEdge::End)?;
        if let Distribution::FixedTime(_) = distribution {
            // fixed-time jobs work on whole days
            start = start.date().midnight().assume_utc();
            end = end.date().with_time(END_OF_DAY).assume_utc();
        }
        if start > end {
            return Err(ConfigError::InvertedRange { start, end });
        }

        Ok(JobConfig {
            job_id: self.job_id.filter(|j| !j.is_empty()),
            event_name,
            external_customer_id,
            start,
            end,
            events_per_day,
            distribution,
            properties: parse_specs(&self.properties),
            replace_existing_events: self.replace_existing_events.unwrap_or(true),
            batch_size,
            settings,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeEdge {
    Start,
    End,
}

/// Parse a range bound into a whole-second UTC timestamp. A bare date means
/// the start of that day for `Start` and its last second for `End`.
fn parse_bound(raw: &str, field: &'static str, edge: RangeEdge) -> Result<OffsetDateTime, ConfigError> {
    let s = raw.trim();
    let invalid = || ConfigError::InvalidDate {
        field,
        value: raw.to_string(),
    };

    let parsed = if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
        ts.to_offset(UtcOffset::UTC)
    } else if let Ok(naive) = PrimitiveDateTime::parse(
        s.split('.').next().unwrap_or(s),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        naive.assume_utc()
    } else {
        let date = Date::parse(s, format_description!("[year]-[month]-[day]")).map_err(|_| invalid())?;
        match edge {
            RangeEdge::Start => date.midnight().assume_utc(),
            RangeEdge::End => date.with_time(END_OF_DAY).assume_utc(),
        }
    };

    parsed.replace_nanosecond(0).map_err(|_| invalid())
}

fn parse_time_of_day(raw: &str) -> Result<Time, ConfigError> {
    Time::parse(raw.trim(), format_description!("[hour]:[minute]:[second]"))
        .or_else(|_| Time::parse(raw.trim(), format_description!("[hour]:[minute]")))
        .map_err(|_| ConfigError::InvalidFixedTime(raw.to_string()))
}
