use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};
use tracing::error;

use crate::buckets;
use crate::common::ConfigError;
use crate::schema::{KindSpec, MetricSchema};
use crate::summary::SummaryVec;

/// The live metric object for one declared schema, fanned out into one time
/// series per realized label-value vector by the client library.
pub enum Instrument {
    Counter(CounterVec),
    Gauge(GaugeVec),
    Summary(SummaryVec),
    Histogram(HistogramVec),
    /// Histogram bucket conversion failed; the instance stays alive but
    /// records nothing.
    None,
}

/// Owns the client-library registry and the single instrument registered in
/// it. Built once per instance, mutated only through instrument updates.
pub struct InstanceRegistry {
    registry: Registry,
    instrument: Instrument,
}

impl InstanceRegistry {
    /// Registers the declared metric exactly once.
    ///
    /// Counter, gauge and summary construction failures are fatal. A
    /// histogram whose bucket parameters fail numeric conversion is logged
    /// and skipped, leaving an inert instrument.
    pub fn new(schema: &MetricSchema) -> Result<InstanceRegistry, ConfigError> {
        let registry = Registry::new();
        let labels: Vec<&str> = schema.variable_labels.iter().map(String::as_str).collect();
        let opts = Opts::new(schema.name.clone(), schema.help.clone())
            .const_labels(schema.constant_labels.clone());

        let instrument = match &schema.spec {
            KindSpec::Counter => {
                let vec = CounterVec::new(opts, &labels)?;
                registry.register(Box::new(vec.clone()))?;
                Instrument::Counter(vec)
            }
            KindSpec::Gauge(_) => {
                let vec = GaugeVec::new(opts, &labels)?;
                registry.register(Box::new(vec.clone()))?;
                Instrument::Gauge(vec)
            }
            KindSpec::Summary(_) => {
                let vec = SummaryVec::new(opts, &labels)?;
                registry.register(Box::new(vec.clone()))?;
                Instrument::Summary(vec)
            }
            KindSpec::Histogram(spec) => match buckets::resolve(&spec.buckets) {
                // the client library substitutes its own default buckets for
                // an empty boundary list, so a zero count must not reach it
                Ok(bounds) if bounds.is_empty() => {
                    error!(
                        metric = %schema.name,
                        "bucket count of zero yields no boundaries, metric not registered"
                    );
                    Instrument::None
                }
                Ok(bounds) => {
                    let opts = HistogramOpts::new(schema.name.clone(), schema.help.clone())
                        .const_labels(schema.constant_labels.clone())
                        .buckets(bounds);
                    match HistogramVec::new(opts, &labels) {
                        Ok(vec) => {
                            registry.register(Box::new(vec.clone()))?;
                            Instrument::Histogram(vec)
                        }
                        Err(err) => {
                            error!(
                                metric = %schema.name,
                                error = %err,
                                "histogram construction failed, metric not registered"
                            );
                            Instrument::None
                        }
                    }
                }
                Err(err) => {
                    error!(
                        metric = %schema.name,
                        error = %err,
                        "histogram buckets failed type conversion, metric not registered"
                    );
                    Instrument::None
                }
            },
        };

        Ok(InstanceRegistry {
            registry,
            instrument,
        })
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// Snapshot of every registered family, for one push attempt.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}
