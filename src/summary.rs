use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use prometheus::core::{Atomic, AtomicF64, AtomicU64, Collector, Desc, Describer};
use prometheus::proto;
use prometheus::Opts;

/// A summary metric fanned out by label values, in the style of the
/// `CounterVec`/`GaugeVec` family.
///
/// The prometheus client library ships no summary vector, so this one records
/// the count and sum of observations per time series and exposes them as a
/// `SUMMARY`-typed family through the `Collector` interface. Quantile
/// estimation is intentionally absent; accumulation semantics stay with the
/// client library primitives.
#[derive(Clone)]
pub struct SummaryVec {
    inner: Arc<Inner>,
}

struct Inner {
    desc: Desc,
    series: Mutex<BTreeMap<Vec<String>, Arc<SummarySeries>>>,
}

/// One time series of a [`SummaryVec`].
pub struct SummarySeries {
    count: AtomicU64,
    sum: AtomicF64,
}

impl SummarySeries {
    fn new() -> SummarySeries {
        SummarySeries {
            count: AtomicU64::new(0),
            sum: AtomicF64::new(0.0),
        }
    }

    pub fn observe(&self, value: f64) {
        self.count.inc_by(1);
        self.sum.inc_by(value);
    }

    pub fn sample_count(&self) -> u64 {
        self.count.get()
    }

    pub fn sample_sum(&self) -> f64 {
        self.sum.get()
    }
}

impl SummaryVec {
    pub fn new(opts: Opts, label_names: &[&str]) -> prometheus::Result<SummaryVec> {
        let variable_labels = label_names.iter().map(|s| s.to_string()).collect();
        let desc = opts.variable_labels(variable_labels).describe()?;
        Ok(SummaryVec {
            inner: Arc::new(Inner {
                desc,
                series: Mutex::new(BTreeMap::new()),
            }),
        })
    }

    /// Returns the series for `values`, creating it on first sight.
    ///
    /// Lookup alone records nothing; a freshly created series reports zero
    /// observations until `observe` is called on it.
    pub fn with_label_values(&self, values: &[&str]) -> Arc<SummarySeries> {
        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        let mut series = lock_series(&self.inner.series);
        series
            .entry(key)
            .or_insert_with(|| Arc::new(SummarySeries::new()))
            .clone()
    }
}

impl Collector for SummaryVec {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.inner.desc]
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        let desc = &self.inner.desc;
        let series = lock_series(&self.inner.series);

        let mut family = proto::MetricFamily::default();
        family.set_name(desc.fq_name.clone());
        family.set_help(desc.help.clone());
        family.set_field_type(proto::MetricType::SUMMARY);

        for (values, s) in series.iter() {
            let mut metric = proto::Metric::default();
            for pair in &desc.const_label_pairs {
                metric.mut_label().push(pair.clone());
            }
            for (name, value) in desc.variable_labels.iter().zip(values.iter()) {
                let mut pair = proto::LabelPair::default();
                pair.set_name(name.clone());
                pair.set_value(value.clone());
                metric.mut_label().push(pair);
            }

            let mut summary = proto::Summary::default();
            summary.set_sample_count(s.sample_count());
            summary.set_sample_sum(s.sample_sum());
            metric.set_summary(summary);

            family.mut_metric().push(metric);
        }

        vec![family]
    }
}

fn lock_series(
    series: &Mutex<BTreeMap<Vec<String>, Arc<SummarySeries>>>,
) -> std::sync::MutexGuard<'_, BTreeMap<Vec<String>, Arc<SummarySeries>>> {
    match series.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
