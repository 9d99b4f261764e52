use std::collections::HashMap;
use std::fmt;

use crate::common::{quote_trim, strip_whitespace, ConfigError};

/// The four metric kinds an output section can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Summary,
    Histogram,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricKind::Counter => "Counter",
            MetricKind::Gauge => "Gauge",
            MetricKind::Summary => "Summary",
            MetricKind::Histogram => "Histogram",
        };
        f.write_str(s)
    }
}

/// Gauge update operation, with the record key it reads where one is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GaugeOp {
    Set(String),
    Add(String),
    Sub(String),
    Inc,
    Dec,
}

impl GaugeOp {
    /// The record field this operation observes, if any.
    pub fn value_key(&self) -> Option<&str> {
        match self {
            GaugeOp::Set(k) | GaugeOp::Add(k) | GaugeOp::Sub(k) => Some(k),
            GaugeOp::Inc | GaugeOp::Dec => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarySpec {
    pub observe_key: String,
}

/// Bucket parameters as configured.
///
/// The numeric fields stay raw strings here: a failed numeric conversion is
/// handled at registration time by skipping the histogram, it must not abort
/// construction the way a missing key does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketSpec {
    Linear {
        count: String,
        width: String,
        start: String,
    },
    Exponential {
        count: String,
        factor: String,
        start: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramSpec {
    pub observe_key: String,
    pub buckets: BucketSpec,
}

/// Exactly one type-specific sub-schema, selected by `metric_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindSpec {
    Counter,
    Gauge(GaugeOp),
    Summary(SummarySpec),
    Histogram(HistogramSpec),
}

/// One validated metric declaration, built once from raw configuration and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSchema {
    pub name: String,
    pub help: String,
    pub constant_labels: HashMap<String, String>,
    pub variable_labels: Vec<String>,
    pub spec: KindSpec,
}

impl MetricSchema {
    /// Parses and validates a raw string configuration into a typed schema.
    ///
    /// Every required key for the declared kind (and, for gauges, the declared
    /// method) is checked independently; a missing one is fatal and names the
    /// offending key. Invalid `metric_constant_labels` JSON is fatal as well.
    pub fn from_config(config: &HashMap<String, String>) -> Result<MetricSchema, ConfigError> {
        let kind = match required_trimmed(config, "metric_type")? {
            "Counter" => MetricKind::Counter,
            "Gauge" => MetricKind::Gauge,
            "Summary" => MetricKind::Summary,
            "Histogram" => MetricKind::Histogram,
            other => return Err(ConfigError::InvalidMetricType(other.to_string())),
        };

        let name = required_trimmed(config, "metric_name")?.to_string();
        let help = required_trimmed(config, "metric_help")?.to_string();
        let constant_labels = parse_constant_labels(config)?;
        let variable_labels = parse_variable_labels(config);

        let spec = match kind {
            MetricKind::Counter => KindSpec::Counter,
            MetricKind::Gauge => KindSpec::Gauge(parse_gauge_op(config)?),
            MetricKind::Summary => KindSpec::Summary(SummarySpec {
                observe_key: required(config, "metric_summary_observe_key")?.to_string(),
            }),
            MetricKind::Histogram => KindSpec::Histogram(HistogramSpec {
                observe_key: required(config, "metric_histogram_observe_key")?.to_string(),
                buckets: parse_bucket_spec(config)?,
            }),
        };

        Ok(MetricSchema {
            name,
            help,
            constant_labels,
            variable_labels,
            spec,
        })
    }

    pub fn kind(&self) -> MetricKind {
        match self.spec {
            KindSpec::Counter => MetricKind::Counter,
            KindSpec::Gauge(_) => MetricKind::Gauge,
            KindSpec::Summary(_) => MetricKind::Summary,
            KindSpec::Histogram(_) => MetricKind::Histogram,
        }
    }
}

pub(crate) fn required<'a>(
    config: &'a HashMap<String, String>,
    key: &'static str,
) -> Result<&'a str, ConfigError> {
    match config.get(key) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingKey(key)),
    }
}

// Only the metric identity fields tolerate surrounding quotes; record keys
// must stay verbatim so a field literally named `"key"` stays reachable.
fn required_trimmed<'a>(
    config: &'a HashMap<String, String>,
    key: &'static str,
) -> Result<&'a str, ConfigError> {
    match config.get(key).map(|v| quote_trim(v)) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingKey(key)),
    }
}

fn parse_constant_labels(
    config: &HashMap<String, String>,
) -> Result<HashMap<String, String>, ConfigError> {
    match config.get("metric_constant_labels") {
        Some(raw) if !raw.is_empty() => {
            serde_json::from_str(raw).map_err(|source| ConfigError::ConstantLabels {
                input: raw.clone(),
                source,
            })
        }
        _ => Ok(HashMap::new()),
    }
}

fn parse_variable_labels(config: &HashMap<String, String>) -> Vec<String> {
    match config.get("metric_variable_labels") {
        Some(raw) if !raw.is_empty() => strip_whitespace(raw)
            .split(',')
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_gauge_op(config: &HashMap<String, String>) -> Result<GaugeOp, ConfigError> {
    match required(config, "metric_gauge_method")? {
        "Set" => Ok(GaugeOp::Set(
            required(config, "metric_gauge_set_key")?.to_string(),
        )),
        "Add" => Ok(GaugeOp::Add(
            required(config, "metric_gauge_add_key")?.to_string(),
        )),
        "Sub" => Ok(GaugeOp::Sub(
            required(config, "metric_gauge_sub_key")?.to_string(),
        )),
        "Inc" => Ok(GaugeOp::Inc),
        "Dec" => Ok(GaugeOp::Dec),
        other => Err(ConfigError::InvalidGaugeMethod(other.to_string())),
    }
}

fn parse_bucket_spec(config: &HashMap<String, String>) -> Result<BucketSpec, ConfigError> {
    match required(config, "metric_histogram_bucket_type")? {
        "Linear" => Ok(BucketSpec::Linear {
            count: required(config, "metric_histogram_linear_buckets_count")?.to_string(),
            width: required(config, "metric_histogram_linear_buckets_width")?.to_string(),
            start: required(config, "metric_histogram_linear_buckets_start")?.to_string(),
        }),
        "Exponential" => Ok(BucketSpec::Exponential {
            count: required(config, "metric_histogram_exponential_buckets_count")?.to_string(),
            factor: required(config, "metric_histogram_exponential_buckets_factor")?.to_string(),
            start: required(config, "metric_histogram_exponential_buckets_start")?.to_string(),
        }),
        other => Err(ConfigError::InvalidBucketType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn counter_schema_builds() {
        let cfg = config(&[
            ("metric_type", "Counter"),
            ("metric_name", "\"reqs_total\""),
            ("metric_help", "\"Total requests\""),
            ("metric_variable_labels", "status, method"),
        ]);
        let schema = MetricSchema::from_config(&cfg).unwrap();
        assert_eq!(schema.kind(), MetricKind::Counter);
        assert_eq!(schema.name, "reqs_total");
        assert_eq!(schema.help, "Total requests");
        assert_eq!(schema.variable_labels, vec!["status", "method"]);
        assert!(schema.constant_labels.is_empty());
    }

    #[test]
    fn only_identity_fields_are_quote_trimmed() {
        let cfg = config(&[
            ("metric_type", "\"Gauge\""),
            ("metric_name", "\"queue_depth\""),
            ("metric_help", "\"Queue depth\""),
            ("metric_gauge_method", "Set"),
            ("metric_gauge_set_key", "\"depth\""),
        ]);
        let schema = MetricSchema::from_config(&cfg).unwrap();
        assert_eq!(schema.name, "queue_depth");
        assert_eq!(schema.help, "Queue depth");
        // the record key keeps its quotes, so a field literally named
        // `"depth"` stays addressable
        assert_eq!(
            schema.spec,
            KindSpec::Gauge(GaugeOp::Set("\"depth\"".to_string()))
        );
    }

    #[test]
    fn constant_labels_parse_from_json() {
        let cfg = config(&[
            ("metric_type", "Counter"),
            ("metric_name", "reqs_total"),
            ("metric_help", "Total requests"),
            ("metric_constant_labels", r#"{"region":"eu","zone":"a"}"#),
        ]);
        let schema = MetricSchema::from_config(&cfg).unwrap();
        assert_eq!(schema.constant_labels.get("region").unwrap(), "eu");
        assert_eq!(schema.constant_labels.get("zone").unwrap(), "a");
    }

    #[test]
    fn invalid_constant_labels_are_fatal() {
        let cfg = config(&[
            ("metric_type", "Counter"),
            ("metric_name", "reqs_total"),
            ("metric_help", "h"),
            ("metric_constant_labels", "{not json"),
        ]);
        let err = MetricSchema::from_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ConstantLabels { .. }));
    }

    #[test]
    fn gauge_set_requires_set_key() {
        let cfg = config(&[
            ("metric_type", "Gauge"),
            ("metric_name", "queue_depth"),
            ("metric_help", "h"),
            ("metric_gauge_method", "Set"),
        ]);
        let err = MetricSchema::from_config(&cfg).unwrap_err();
        match err {
            ConfigError::MissingKey(key) => assert_eq!(key, "metric_gauge_set_key"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn gauge_inc_needs_no_key() {
        let cfg = config(&[
            ("metric_type", "Gauge"),
            ("metric_name", "sessions"),
            ("metric_help", "h"),
            ("metric_gauge_method", "Inc"),
        ]);
        let schema = MetricSchema::from_config(&cfg).unwrap();
        assert_eq!(schema.spec, KindSpec::Gauge(GaugeOp::Inc));
    }

    #[test]
    fn unknown_gauge_method_is_fatal() {
        let cfg = config(&[
            ("metric_type", "Gauge"),
            ("metric_name", "g"),
            ("metric_help", "h"),
            ("metric_gauge_method", "Observe"),
        ]);
        let err = MetricSchema::from_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGaugeMethod(m) if m == "Observe"));
    }

    #[test]
    fn unknown_metric_type_is_fatal() {
        let cfg = config(&[
            ("metric_type", "Meter"),
            ("metric_name", "m"),
            ("metric_help", "h"),
        ]);
        let err = MetricSchema::from_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMetricType(t) if t == "Meter"));
    }

    #[test]
    fn histogram_linear_keeps_raw_params() {
        let cfg = config(&[
            ("metric_type", "Histogram"),
            ("metric_name", "dur"),
            ("metric_help", "h"),
            ("metric_histogram_observe_key", "duration"),
            ("metric_histogram_bucket_type", "Linear"),
            ("metric_histogram_linear_buckets_count", "5"),
            ("metric_histogram_linear_buckets_width", "10"),
            ("metric_histogram_linear_buckets_start", "0"),
        ]);
        let schema = MetricSchema::from_config(&cfg).unwrap();
        match schema.spec {
            KindSpec::Histogram(HistogramSpec {
                observe_key,
                buckets: BucketSpec::Linear { count, width, start },
            }) => {
                assert_eq!(observe_key, "duration");
                assert_eq!((count.as_str(), width.as_str(), start.as_str()), ("5", "10", "0"));
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn histogram_missing_bucket_param_is_fatal() {
        let cfg = config(&[
            ("metric_type", "Histogram"),
            ("metric_name", "dur"),
            ("metric_help", "h"),
            ("metric_histogram_observe_key", "duration"),
            ("metric_histogram_bucket_type", "Exponential"),
            ("metric_histogram_exponential_buckets_count", "4"),
            ("metric_histogram_exponential_buckets_factor", "2"),
        ]);
        let err = MetricSchema::from_config(&cfg).unwrap_err();
        match err {
            ConfigError::MissingKey(key) => {
                assert_eq!(key, "metric_histogram_exponential_buckets_start")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn summary_requires_observe_key() {
        let cfg = config(&[
            ("metric_type", "Summary"),
            ("metric_name", "lat"),
            ("metric_help", "h"),
        ]);
        let err = MetricSchema::from_config(&cfg).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingKey("metric_summary_observe_key")
        ));
    }
}
