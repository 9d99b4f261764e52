use crate::common::ConversionError;
use crate::schema::BucketSpec;

/// `count` boundaries starting at `start`, each `width` apart.
pub fn linear_buckets(start: f64, width: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + i as f64 * width).collect()
}

/// `count` boundaries starting at `start`, each `factor` times the previous.
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start * factor.powi(i as i32)).collect()
}

/// Converts the raw configured parameters into bucket boundaries.
///
/// Parse failures are reported to the caller, which logs them and leaves the
/// histogram unregistered instead of aborting the instance.
pub fn resolve(spec: &BucketSpec) -> Result<Vec<f64>, ConversionError> {
    match spec {
        BucketSpec::Linear {
            count,
            width,
            start,
        } => {
            let start = parse_f64("metric_histogram_linear_buckets_start", start)?;
            let width = parse_f64("metric_histogram_linear_buckets_width", width)?;
            let count = parse_count("metric_histogram_linear_buckets_count", count)?;
            Ok(linear_buckets(start, width, count))
        }
        BucketSpec::Exponential {
            count,
            factor,
            start,
        } => {
            let start = parse_f64("metric_histogram_exponential_buckets_start", start)?;
            let factor = parse_f64("metric_histogram_exponential_buckets_factor", factor)?;
            let count = parse_count("metric_histogram_exponential_buckets_count", count)?;
            Ok(exponential_buckets(start, factor, count))
        }
    }
}

fn parse_f64(key: &'static str, value: &str) -> Result<f64, ConversionError> {
    value.parse().map_err(|_| ConversionError::BucketParam {
        key,
        value: value.to_string(),
    })
}

fn parse_count(key: &'static str, value: &str) -> Result<usize, ConversionError> {
    value.parse().map_err(|_| ConversionError::BucketParam {
        key,
        value: value.to_string(),
    })
}
