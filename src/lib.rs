//! A config-driven core that turns structured log records into Prometheus
//! metric observations and pushes them to a Pushgateway.
//!
//! ## Basics
//!
//! An operator declares, once per output section, what metric to produce:
//! its kind (counter, gauge, summary or histogram), name, labels and a
//! value-extraction rule. The engine then maps every incoming record into an
//! update against that metric and delivers the accumulated snapshot to a
//! push-based gateway at the end of each flush cycle.
//!
//! ## High-level features
//!
//! - declarative metric schema validated against type-specific constraints
//! - per-record label resolution (missing fields become empty label values)
//! - tolerant numeric extraction from free-form text like `"12.5ms"`
//! - linear and exponential histogram bucket generation
//! - bounded-retry push delivery with host-visible retry/error codes
//!
//! ## Behavior
//!
//! This core makes some explicit trade-offs to accomplish its task:
//!
//! - Metrics are accumulated locally by the client library and pushed as a
//!   whole snapshot once per cycle
//! - A push failure past the retry budget drops that cycle's data; nothing
//!   is buffered
//! - The push is a blocking call with no timeout of its own
//! - No aggregation or windowing happens beyond the client library's
//!   accumulation semantics
//!
//! The host owns the plugin lifecycle: it decodes the wire format into
//! [`Record`] values, drives one [`OutputInstance::flush`] per cycle, and
//! interprets the returned [`FlushStatus`].
//!
//! ## Usage
//!
//! ```ignore
//! // Raw string configuration for one output section.
//! let mut config = HashMap::new();
//! config.insert("id".into(), "out.0".into());
//! config.insert("job".into(), "access-logs".into());
//! config.insert("url".into(), "http://localhost:9091".into());
//! config.insert("metric_type".into(), "Counter".into());
//! config.insert("metric_name".into(), "requests_total".into());
//! config.insert("metric_help".into(), "Requests seen".into());
//! config.insert("metric_variable_labels".into(), "status".into());
//!
//! let mut instance = OutputInstance::new(&config)?;
//! instance.initial_push();
//!
//! // Per flush cycle, hand over the decoded batch:
//! let status = instance.flush("app.access", &records);
//! ```
mod common;
pub use self::common::{ConfigError, ConversionError, FlushStatus, LogLevel, PushError};

pub mod buckets;

mod extract;
pub use self::extract::ValueExtractor;

mod schema;
pub use self::schema::{
    BucketSpec, GaugeOp, HistogramSpec, KindSpec, MetricKind, MetricSchema, SummarySpec,
};

mod record;
pub use self::record::{FieldValue, NormalizedRecord, Record, Timestamp};

mod summary;
pub use self::summary::{SummarySeries, SummaryVec};

mod registry;
pub use self::registry::{InstanceRegistry, Instrument};

pub mod translate;

mod push;
pub use self::push::{Push, PushClient, PushController, PushPhase};

mod plugin;
pub use self::plugin::OutputInstance;
