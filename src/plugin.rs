use std::collections::HashMap;

use tracing::{debug, error, info};

use crate::common::{ConfigError, FlushStatus, LogLevel};
use crate::extract::ValueExtractor;
use crate::push::{Push, PushClient, PushController};
use crate::record::{NormalizedRecord, Record};
use crate::registry::InstanceRegistry;
use crate::schema::{required, MetricSchema};
use crate::translate;

/// One configured output section: a metric declaration, its live registry,
/// and the push-retry state for its gateway.
///
/// Every operation is synchronous and host-driven; an instance owns no
/// threads and shares no mutable state with its siblings.
pub struct OutputInstance {
    id: String,
    job: String,
    log_level: LogLevel,
    schema: MetricSchema,
    registry: InstanceRegistry,
    extractor: ValueExtractor,
    controller: PushController,
    pusher: Box<dyn Push + Send>,
}

impl OutputInstance {
    /// Builds an instance from the raw string configuration of one output
    /// section. Any missing or invalid required field is fatal; the instance
    /// never becomes operational.
    pub fn new(config: &HashMap<String, String>) -> Result<OutputInstance, ConfigError> {
        let url = required(config, "url")?;
        let job = required(config, "job")?;
        let pusher = PushClient::new(url, job)?;
        OutputInstance::with_pusher(config, Box::new(pusher))
    }

    /// Like [`new`](OutputInstance::new), but with delivery handed to any
    /// [`Push`] implementation instead of the gateway HTTP client.
    pub fn with_pusher(
        config: &HashMap<String, String>,
        pusher: Box<dyn Push + Send>,
    ) -> Result<OutputInstance, ConfigError> {
        let id = required(config, "id")?.to_string();
        let job = required(config, "job")?.to_string();
        let log_level = LogLevel::from_config(config.get("LogLevel").map(String::as_str));
        let controller =
            PushController::from_config(config.get("push_gateway_retries").map(String::as_str));
        let schema = MetricSchema::from_config(config)?;
        let registry = InstanceRegistry::new(&schema)?;

        info!(
            id = %id,
            job = %job,
            metric_type = %schema.kind(),
            metric_name = %schema.name,
            metric_help = %schema.help,
            constant_labels = ?schema.constant_labels,
            variable_labels = ?schema.variable_labels,
            max_retries = controller.max_retries(),
            "output instance configured"
        );

        Ok(OutputInstance {
            id,
            job,
            log_level,
            schema,
            registry,
            extractor: ValueExtractor::new(),
            controller,
            pusher,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// Runs one push cycle right after construction, so that an unreachable
    /// gateway surfaces before the first batch arrives.
    pub fn initial_push(&mut self) -> FlushStatus {
        self.push_cycle()
    }

    /// Translates one decoded batch into metric updates, then attempts
    /// delivery.
    ///
    /// A record whose value cannot be coerced to a number is logged and
    /// skipped; the rest of the batch still applies. The returned status is
    /// the host-visible outcome of the trailing push cycle.
    pub fn flush(&mut self, tag: &str, batch: &[Record]) -> FlushStatus {
        debug!(id = %self.id, tag, records = batch.len(), "flush called");

        for (index, record) in batch.iter().enumerate() {
            let timestamp = record.timestamp.resolve();
            let normalized = NormalizedRecord::from_fields(&record.fields);

            match translate::apply(&self.schema, &self.registry, &self.extractor, &normalized) {
                Ok(labels) => {
                    if self.log_level >= LogLevel::Debug {
                        debug!(
                            index,
                            tag,
                            timestamp = %timestamp,
                            record = ?normalized,
                            labels = ?labels,
                            "record translated"
                        );
                    }
                }
                Err(err) => {
                    error!(id = %self.id, error = %err, "record update skipped");
                }
            }
        }

        self.push_cycle()
    }

    fn push_cycle(&mut self) -> FlushStatus {
        self.controller
            .run_cycle(self.pusher.as_ref(), self.registry.gather())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PushError;
    use crate::record::{FieldValue, Timestamp};
    use crate::registry::Instrument;
    use prometheus::proto::MetricFamily;
    use std::cell::{Cell, RefCell};

    struct ScriptedPush {
        healthy: Cell<bool>,
        pushed: RefCell<Vec<Vec<MetricFamily>>>,
    }

    impl ScriptedPush {
        fn new(healthy: bool) -> ScriptedPush {
            ScriptedPush {
                healthy: Cell::new(healthy),
                pushed: RefCell::new(Vec::new()),
            }
        }
    }

    impl Push for ScriptedPush {
        fn push(&self, families: Vec<MetricFamily>) -> Result<(), PushError> {
            self.pushed.borrow_mut().push(families);
            if self.healthy.get() {
                Ok(())
            } else {
                Err(PushError::Gateway {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                })
            }
        }
    }

    fn config(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn counter_config() -> HashMap<String, String> {
        config(&[
            ("id", "out.0"),
            ("job", "batch"),
            ("metric_type", "Counter"),
            ("metric_name", "reqs_total"),
            ("metric_help", "Total requests"),
            ("metric_variable_labels", "status"),
            ("push_gateway_retries", "3"),
        ])
    }

    fn record(fields: &[(&str, &str)]) -> Record {
        Record {
            timestamp: Timestamp::EpochSeconds(1_700_000_000),
            fields: fields
                .iter()
                .map(|(k, v)| (FieldValue::from(*k), FieldValue::from(*v)))
                .collect(),
        }
    }

    #[test]
    fn flush_translates_and_pushes() {
        let mut instance =
            OutputInstance::with_pusher(&counter_config(), Box::new(ScriptedPush::new(true)))
                .unwrap();

        let status = instance.flush(
            "app.access",
            &[
                record(&[("status", "200")]),
                record(&[("status", "200")]),
                record(&[("status", "500")]),
            ],
        );
        assert_eq!(status, FlushStatus::Ok);

        let Instrument::Counter(vec) = instance.registry.instrument() else {
            panic!("expected counter");
        };
        assert_eq!(vec.with_label_values(&["200"]).get(), 2.0);
        assert_eq!(vec.with_label_values(&["500"]).get(), 1.0);
    }

    #[test]
    fn flush_retry_sequence_matches_the_state_machine() {
        let mut instance =
            OutputInstance::with_pusher(&counter_config(), Box::new(ScriptedPush::new(false)))
                .unwrap();

        let batch = [record(&[("status", "200")])];
        assert_eq!(instance.flush("t", &batch), FlushStatus::Retry);
        assert_eq!(instance.flush("t", &batch), FlushStatus::Retry);
        assert_eq!(instance.flush("t", &batch), FlushStatus::Retry);
        assert_eq!(instance.flush("t", &batch), FlushStatus::Error);
        assert_eq!(instance.controller.retry_count(), 0);
        // the next cycle starts the bounded retry window over
        assert_eq!(instance.flush("t", &batch), FlushStatus::Retry);
    }

    #[test]
    fn a_bad_record_does_not_poison_the_batch() {
        let cfg = config(&[
            ("id", "out.1"),
            ("job", "batch"),
            ("metric_type", "Gauge"),
            ("metric_name", "queue_depth"),
            ("metric_help", "h"),
            ("metric_gauge_method", "Set"),
            ("metric_gauge_set_key", "depth"),
        ]);
        let mut instance =
            OutputInstance::with_pusher(&cfg, Box::new(ScriptedPush::new(true))).unwrap();

        let status = instance.flush(
            "t",
            &[
                record(&[("depth", "oops")]),
                record(&[("depth", "12.5ms")]),
            ],
        );
        assert_eq!(status, FlushStatus::Ok);

        let Instrument::Gauge(vec) = instance.registry.instrument() else {
            panic!("expected gauge");
        };
        assert_eq!(vec.with_label_values(&[]).get(), 12.5);
    }

    #[test]
    fn initial_push_delivers_the_empty_snapshot() {
        let pusher = Box::new(ScriptedPush::new(true));
        let mut instance = OutputInstance::with_pusher(&counter_config(), pusher).unwrap();
        assert_eq!(instance.initial_push(), FlushStatus::Ok);
    }

    #[test]
    fn missing_id_is_fatal() {
        let mut cfg = counter_config();
        cfg.remove("id");
        let err = OutputInstance::with_pusher(&cfg, Box::new(ScriptedPush::new(true)))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::MissingKey("id")));
    }

    #[test]
    fn missing_url_is_fatal_for_the_gateway_client() {
        let mut cfg = counter_config();
        cfg.insert("url".to_string(), String::new());
        let err = OutputInstance::new(&cfg).err().unwrap();
        assert!(matches!(err, ConfigError::MissingKey("url")));
    }
}
