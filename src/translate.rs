use tracing::debug;

use crate::common::ConversionError;
use crate::extract::ValueExtractor;
use crate::record::NormalizedRecord;
use crate::registry::{InstanceRegistry, Instrument};
use crate::schema::{GaugeOp, KindSpec, MetricSchema};

/// Applies one normalized record against the instance's metric.
///
/// Label values are resolved in declared order, with missing fields mapping
/// to the empty string. A failed value extraction skips only this record's
/// update and is returned for logging; the record itself stays consumed and
/// the batch continues.
///
/// Returns the label values that were used, for debug output.
pub fn apply(
    schema: &MetricSchema,
    registry: &InstanceRegistry,
    extractor: &ValueExtractor,
    record: &NormalizedRecord,
) -> Result<Vec<String>, ConversionError> {
    let labels: Vec<String> = schema
        .variable_labels
        .iter()
        .map(|name| record.label_value(name))
        .collect();
    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();

    match (&schema.spec, registry.instrument()) {
        // a counter has no value key: every matched record counts exactly once
        (KindSpec::Counter, Instrument::Counter(vec)) => {
            vec.with_label_values(&label_refs).inc();
        }
        (KindSpec::Gauge(op), Instrument::Gauge(vec)) => match op {
            GaugeOp::Set(key) => {
                let value = extract_value(extractor, record, key)?;
                vec.with_label_values(&label_refs).set(value);
            }
            GaugeOp::Add(key) => {
                let value = extract_value(extractor, record, key)?;
                vec.with_label_values(&label_refs).add(value);
            }
            GaugeOp::Sub(key) => {
                let value = extract_value(extractor, record, key)?;
                vec.with_label_values(&label_refs).sub(value);
            }
            GaugeOp::Inc => vec.with_label_values(&label_refs).inc(),
            GaugeOp::Dec => vec.with_label_values(&label_refs).dec(),
        },
        (KindSpec::Summary(spec), Instrument::Summary(vec)) => {
            let value = extract_value(extractor, record, &spec.observe_key)?;
            vec.with_label_values(&label_refs).observe(value);
        }
        (KindSpec::Histogram(spec), Instrument::Histogram(vec)) => {
            let value = extract_value(extractor, record, &spec.observe_key)?;
            vec.with_label_values(&label_refs).observe(value);
        }
        (_, Instrument::None) => {
            debug!("no metric registered for this instance, record ignored");
        }
        _ => {
            debug!("instrument does not match the declared metric kind, record ignored");
        }
    }

    Ok(labels)
}

// Extraction happens before any series lookup so that a failed record never
// allocates a new time series.
fn extract_value(
    extractor: &ValueExtractor,
    record: &NormalizedRecord,
    key: &str,
) -> Result<f64, ConversionError> {
    let text = record.value_text(key);
    extractor
        .extract(&text)
        .ok_or_else(|| ConversionError::ValueNotNumeric {
            key: key.to_string(),
            value: text,
        })
}
