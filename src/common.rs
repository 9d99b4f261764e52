use thiserror::Error;

/// Errors that invalidate an instance's configuration.
///
/// Any of these aborts construction: the instance never becomes operational
/// and no metric is served for it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required configuration key `{0}` is not populated")]
    MissingKey(&'static str),

    #[error("unknown metric_type `{0}`, expected Counter, Gauge, Summary or Histogram")]
    InvalidMetricType(String),

    #[error("unknown metric_gauge_method `{0}`, expected Set, Add, Sub, Inc or Dec")]
    InvalidGaugeMethod(String),

    #[error("unknown metric_histogram_bucket_type `{0}`, expected Linear or Exponential")]
    InvalidBucketType(String),

    #[error("metric_constant_labels is not a valid JSON object of strings: `{input}`")]
    ConstantLabels {
        input: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("metric registration failed")]
    Metric(#[from] prometheus::Error),

    #[error("failed to build the gateway HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

/// Errors recovered locally: the offending update is logged and skipped,
/// the instance stays operational.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("no numeric value could be extracted from key `{key}` with value `{value}`")]
    ValueNotNumeric { key: String, value: String },

    #[error("bucket parameter `{key}` failed numeric conversion: `{value}`")]
    BucketParam { key: &'static str, value: String },
}

/// Errors from a single push attempt against the gateway.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("could not reach the push gateway")]
    Transport(#[from] reqwest::Error),

    #[error("push gateway returned status {status}")]
    Gateway { status: reqwest::StatusCode },

    #[error("failed to encode metrics for the gateway")]
    Encode(#[from] prometheus::Error),
}

/// Per-cycle return code handed back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStatus {
    /// The cycle completed and the push was accepted.
    Ok,
    /// The push failed transiently; the host should re-drive the cycle.
    Retry,
    /// Retries are exhausted or the failure is final; cycle data is dropped.
    Error,
}

/// Per-instance logging verbosity, parsed from the `LogLevel` config key.
///
/// The crate never installs a subscriber; this only gates the verbose
/// per-record dumps the way the host plugin historically did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    /// Absent or empty defaults to `Error`; an unrecognized value falls back
    /// to `Info`.
    pub fn from_config(raw: Option<&str>) -> LogLevel {
        match raw.map(|l| l.trim().to_ascii_lowercase()) {
            None => LogLevel::Error,
            Some(l) if l.is_empty() => LogLevel::Error,
            Some(l) => match l.as_str() {
                "error" => LogLevel::Error,
                "warn" => LogLevel::Warn,
                "info" => LogLevel::Info,
                "debug" => LogLevel::Debug,
                _ => LogLevel::Info,
            },
        }
    }
}

/// Trims one pair of surrounding double quotes if present.
pub fn quote_trim(key: &str) -> &str {
    let key = key.strip_prefix('"').unwrap_or(key);
    key.strip_suffix('"').unwrap_or(key)
}

/// Removes every whitespace character from `s`.
pub fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}
