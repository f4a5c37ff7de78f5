//! Benchmark configuration.
//!
//! Values come from built-in defaults, optionally a YAML file, and finally
//! environment variables (env > yaml > defaults).

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::client::ClientConfig;
use crate::histogram::{HistogramConfig, DEFAULT_LOWEST_DISCERNIBLE, DEFAULT_SIGNIFICANT_DIGITS};
use crate::runner::RunOptions;
use crate::utils::parse_duration_string;

/// Environment variable naming an optional YAML config file.
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Which unit of work every worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Write,
    BatchWrite,
    CounterUpdate,
    Read,
    CounterRead,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "write" => Ok(Mode::Write),
            "batch-write" | "batch_write" => Ok(Mode::BatchWrite),
            "counter-update" | "counter_update" => Ok(Mode::CounterUpdate),
            "read" => Ok(Mode::Read),
            "counter-read" | "counter_read" => Ok(Mode::CounterRead),
            other => Err(format!(
                "unknown mode '{}'. Expected one of: write, batch-write, counter-update, read, counter-read",
                other
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Write => "write",
            Mode::BatchWrite => "batch-write",
            Mode::CounterUpdate => "counter-update",
            Mode::Read => "read",
            Mode::CounterRead => "counter-read",
        })
    }
}

/// How keys are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    Sequential,
    Uniform,
}

impl FromStr for WorkloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(WorkloadKind::Sequential),
            "uniform" => Ok(WorkloadKind::Uniform),
            other => Err(format!(
                "unknown workload '{}'. Expected one of: sequential, uniform",
                other
            )),
        }
    }
}

/// Which clustering rows a read asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadShape {
    /// `ck` lower bound with a row limit.
    #[default]
    Default,
    /// An explicit list of clustering keys.
    InRestriction,
    /// Half-open `ck..ck_end` range with no limit.
    UpperBound,
    /// Only a row limit; reads from the start of the partition.
    NoLowerBound,
}

impl FromStr for ReadShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "default" => Ok(ReadShape::Default),
            "in-restriction" => Ok(ReadShape::InRestriction),
            "upper-bound" => Ok(ReadShape::UpperBound),
            "no-lower-bound" => Ok(ReadShape::NoLowerBound),
            other => Err(format!(
                "unknown read shape '{}'. Expected one of: default, in-restriction, upper-bound, no-lower-bound",
                other
            )),
        }
    }
}

impl fmt::Display for ReadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadShape::Default => "default",
            ReadShape::InRestriction => "in-restriction",
            ReadShape::UpperBound => "upper-bound",
            ReadShape::NoLowerBound => "no-lower-bound",
        })
    }
}

/// Duration as written in YAML: integer seconds or a string like "250ms".
#[derive(Deserialize)]
#[serde(untagged)]
enum YamlDuration {
    Seconds(u64),
    String(String),
}

impl YamlDuration {
    fn to_duration(&self) -> Result<Duration, String> {
        match self {
            YamlDuration::Seconds(s) => Ok(Duration::from_secs(*s)),
            YamlDuration::String(s) => parse_duration_string(s),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    YamlDuration::deserialize(deserializer)?
        .to_duration()
        .map_err(serde::de::Error::custom)
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<YamlDuration>::deserialize(deserializer)?
        .map(|d| d.to_duration().map_err(serde::de::Error::custom))
        .transpose()
}

/// Latency histogram bounds. `highest` defaults to three times the timeout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct HistogramSettings {
    #[serde(deserialize_with = "deserialize_duration")]
    pub lowest: Duration,
    #[serde(deserialize_with = "deserialize_optional_duration")]
    pub highest: Option<Duration>,
    pub significant_digits: u8,
}

impl Default for HistogramSettings {
    fn default() -> Self {
        Self {
            lowest: DEFAULT_LOWEST_DISCERNIBLE,
            highest: None,
            significant_digits: DEFAULT_SIGNIFICANT_DIGITS,
        }
    }
}

/// Main configuration for a benchmark run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Config {
    pub name: String,
    pub target_url: String,
    pub mode: Mode,
    pub workload: WorkloadKind,
    pub concurrency: usize,
    /// Aggregate operations per second; zero is unlimited.
    pub maximum_rate: u64,
    /// Zero runs until the workload is exhausted or the run is stopped.
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    pub partition_offset: i64,
    pub partition_count: i64,
    pub clustering_row_count: i64,
    pub clustering_row_size: usize,
    pub rows_per_request: usize,
    pub read_shape: ReadShape,
    pub measure_latency: bool,
    pub histogram: HistogramSettings,
    #[serde(deserialize_with = "deserialize_duration")]
    pub report_interval: Duration,
    pub pushgateway_url: Option<String>,
    pub custom_headers: Option<String>,
    pub skip_tls_verify: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "rust_loadbench".to_string(),
            target_url: "http://127.0.0.1:8080".to_string(),
            mode: Mode::Write,
            workload: WorkloadKind::Sequential,
            concurrency: 16,
            maximum_rate: 0,
            duration: Duration::ZERO,
            timeout: Duration::from_secs(5),
            partition_offset: 0,
            partition_count: 10_000,
            clustering_row_count: 100,
            clustering_row_size: 4,
            rows_per_request: 1,
            read_shape: ReadShape::Default,
            measure_latency: true,
            histogram: HistogramSettings::default(),
            report_interval: Duration::from_secs(1),
            pushgateway_url: None,
            custom_headers: None,
            skip_tls_verify: false,
        }
    }
}

impl Config {
    /// Loads `CONFIG_FILE` if set, applies env overrides, and validates.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Overrides fields from environment variables that are set.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_string("BENCH_NAME") {
            self.name = v;
        }
        if let Some(v) = env_string("TARGET_URL") {
            self.target_url = v;
        }
        if let Some(v) = env_parse("MODE")? {
            self.mode = v;
        }
        if let Some(v) = env_parse("WORKLOAD")? {
            self.workload = v;
        }
        if let Some(v) = env_parse("CONCURRENCY")? {
            self.concurrency = v;
        }
        if let Some(v) = env_parse("MAXIMUM_RATE")? {
            self.maximum_rate = v;
        }
        if let Some(v) = env_duration("TEST_DURATION")? {
            self.duration = v;
        }
        if let Some(v) = env_duration("REQUEST_TIMEOUT")? {
            self.timeout = v;
        }
        if let Some(v) = env_parse("PARTITION_OFFSET")? {
            self.partition_offset = v;
        }
        if let Some(v) = env_parse("PARTITION_COUNT")? {
            self.partition_count = v;
        }
        if let Some(v) = env_parse("CLUSTERING_ROW_COUNT")? {
            self.clustering_row_count = v;
        }
        if let Some(v) = env_parse("CLUSTERING_ROW_SIZE")? {
            self.clustering_row_size = v;
        }
        if let Some(v) = env_parse("ROWS_PER_REQUEST")? {
            self.rows_per_request = v;
        }
        if let Some(v) = env_parse("READ_SHAPE")? {
            self.read_shape = v;
        }
        if let Some(v) = env_bool("MEASURE_LATENCY")? {
            self.measure_latency = v;
        }
        if let Some(v) = env_duration("HISTOGRAM_LOWEST")? {
            self.histogram.lowest = v;
        }
        if let Some(v) = env_duration("HISTOGRAM_HIGHEST")? {
            self.histogram.highest = Some(v);
        }
        if let Some(v) = env_parse("HISTOGRAM_SIGNIFICANT_DIGITS")? {
            self.histogram.significant_digits = v;
        }
        if let Some(v) = env_duration("REPORT_INTERVAL")? {
            self.report_interval = v;
        }
        if let Some(v) = env_string("PUSHGATEWAY_URL") {
            self.pushgateway_url = Some(v);
        }
        if let Some(v) = env_string("CUSTOM_HEADERS") {
            self.custom_headers = Some(v);
        }
        if let Some(v) = env_bool("SKIP_TLS_VERIFY")? {
            self.skip_tls_verify = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("concurrency", "must be greater than 0"));
        }
        if !self.target_url.starts_with("http://") && !self.target_url.starts_with("https://") {
            return Err(ConfigError::invalid(
                "targetUrl",
                format!("must start with http:// or https://, got '{}'", self.target_url),
            ));
        }
        if self.partition_count <= 0 {
            return Err(ConfigError::invalid("partitionCount", "must be greater than 0"));
        }
        if self
            .partition_offset
            .checked_add(self.partition_count)
            .is_none()
        {
            return Err(ConfigError::invalid(
                "partitionOffset",
                format!(
                    "offset {} plus {} partitions overflows the key space",
                    self.partition_offset, self.partition_count
                ),
            ));
        }
        if self.clustering_row_count <= 0 {
            return Err(ConfigError::invalid(
                "clusteringRowCount",
                "must be greater than 0",
            ));
        }
        if self.rows_per_request == 0 {
            return Err(ConfigError::invalid("rowsPerRequest", "must be greater than 0"));
        }
        if self.read_shape == ReadShape::NoLowerBound
            && matches!(self.mode, Mode::Read | Mode::CounterRead)
            && self.workload == WorkloadKind::Sequential
            && self.duration.is_zero()
        {
            return Err(ConfigError::invalid(
                "readShape",
                "no-lower-bound never advances a sequential workload; set a duration",
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "must be greater than 0"));
        }
        if self.report_interval.is_zero() {
            return Err(ConfigError::invalid("reportInterval", "must be greater than 0"));
        }
        self.histogram_config()?;
        Ok(())
    }

    /// `None` when latency measurement is disabled.
    pub fn histogram_config(&self) -> Result<Option<HistogramConfig>, ConfigError> {
        if !self.measure_latency {
            return Ok(None);
        }

        let highest = self
            .histogram
            .highest
            .unwrap_or_else(|| self.timeout.saturating_mul(3));
        HistogramConfig::new(
            self.histogram.lowest,
            highest,
            self.histogram.significant_digits,
        )
        .map(Some)
        .map_err(|e| ConfigError::invalid("histogram", e.to_string()))
    }

    pub fn run_options(&self) -> Result<RunOptions, ConfigError> {
        Ok(RunOptions {
            name: self.name.clone(),
            concurrency: self.concurrency,
            maximum_rate: self.maximum_rate,
            histogram: self.histogram_config()?,
            report_interval: self.report_interval,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: self.timeout,
            skip_tls_verify: self.skip_tls_verify,
            custom_headers: self.custom_headers.clone(),
        }
    }

    /// Prints the configuration summary.
    pub fn print_summary(&self) {
        println!("Configuration:");
        println!("  Name:                {}", self.name);
        println!("  Target URL:          {}", self.target_url);
        println!("  Mode:                {}", self.mode);
        println!("  Workload:            {:?}", self.workload);
        println!("  Concurrency:         {}", self.concurrency);
        if self.maximum_rate == 0 {
            println!("  Maximum rate:        unlimited");
        } else {
            println!("  Maximum rate:        {} ops/s", self.maximum_rate);
        }
        if self.duration.is_zero() {
            println!("  Duration:            until workload exhausted");
        } else {
            println!("  Duration:            {:?}", self.duration);
        }
        println!("  Timeout:             {:?}", self.timeout);
        println!(
            "  Partitions:          {} (offset {})",
            self.partition_count, self.partition_offset
        );
        println!("  Clustering rows:     {}", self.clustering_row_count);
        println!("  Row size:            {} bytes", self.clustering_row_size);
        println!("  Rows per request:    {}", self.rows_per_request);
        if matches!(self.mode, Mode::Read | Mode::CounterRead) {
            println!("  Read shape:          {}", self.read_shape);
        }
        println!("  Measure latency:     {}", self.measure_latency);
        match &self.pushgateway_url {
            Some(url) => println!("  Pushgateway:         {}", url),
            None => println!("  Pushgateway:         disabled"),
        }
        println!();
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env_string(name)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::invalid(name, format!("'{}': {}", v, e)))
        })
        .transpose()
}

fn env_duration(name: &str) -> Result<Option<Duration>, ConfigError> {
    env_string(name)
        .map(|v| parse_duration_string(&v).map_err(|e| ConfigError::invalid(name, e)))
        .transpose()
}

fn env_bool(name: &str) -> Result<Option<bool>, ConfigError> {
    env_string(name)
        .map(|v| match v.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::invalid(
                name,
                format!("'{}' is not a boolean", v),
            )),
        })
        .transpose()
}
