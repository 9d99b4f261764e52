use prometheus::proto::MetricFamily;
use prometheus::{Encoder, TextEncoder};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{error, warn};

use crate::common::{ConfigError, FlushStatus, PushError};

/// One blocking delivery attempt of a metrics snapshot.
///
/// The call blocks until the gateway responds or the transport's own timeout
/// fires; no timeout is enforced here.
pub trait Push {
    fn push(&self, families: Vec<MetricFamily>) -> Result<(), PushError>;
}

/// Pushes the text exposition format to a Prometheus Pushgateway, grouping
/// all of the instance's metrics under its job name.
pub struct PushClient {
    endpoint: String,
    http: Client,
}

impl PushClient {
    pub fn new(url: &str, job: &str) -> Result<PushClient, ConfigError> {
        let http = Client::builder().build().map_err(ConfigError::HttpClient)?;
        Ok(PushClient {
            endpoint: format!("{}/metrics/job/{}", url.trim_end_matches('/'), job),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Push for PushClient {
    fn push(&self, families: Vec<MetricFamily>) -> Result<(), PushError> {
        let encoder = TextEncoder::new();
        let mut body = Vec::new();
        encoder.encode(&families, &mut body)?;

        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, encoder.format_type())
            .body(body)
            .send()?;

        if !response.status().is_success() {
            return Err(PushError::Gateway {
                status: response.status(),
            });
        }
        Ok(())
    }
}

/// Where the coordinator stands within the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPhase {
    Idle,
    Attempting,
    RetryScheduled,
    Exhausted,
}

/// Bounded-retry state machine around push attempts.
///
/// The controller holds no timer: `RetryScheduled` and `Exhausted` both
/// re-enter `Attempting` when the host drives the next cycle. Data for an
/// exhausted cycle is dropped, not buffered.
pub struct PushController {
    max_retries: u64,
    retry_count: u64,
    phase: PushPhase,
}

impl PushController {
    pub fn new(max_retries: u64) -> PushController {
        PushController {
            max_retries,
            retry_count: 0,
            phase: PushPhase::Idle,
        }
    }

    /// Builds the controller from the raw `push_gateway_retries` value,
    /// defaulting to 3 with a logged warning when unset or unparsable.
    pub fn from_config(raw: Option<&str>) -> PushController {
        let max_retries = match raw {
            Some(v) if !v.is_empty() => match v.parse() {
                Ok(n) => n,
                Err(_) => {
                    warn!(value = v, "push_gateway_retries not a valid integer, defaulting to 3");
                    3
                }
            },
            _ => {
                warn!("push_gateway_retries not set, defaulting to 3");
                3
            }
        };
        PushController::new(max_retries)
    }

    /// Runs one push cycle and reports the host-visible outcome.
    ///
    /// Success resets the retry counter immediately. A failure schedules a
    /// retry while attempts remain; once `max_retries` consecutive failures
    /// have been retried, the next failing cycle is terminal and the counter
    /// resets to zero.
    pub fn run_cycle(&mut self, pusher: &dyn Push, families: Vec<MetricFamily>) -> FlushStatus {
        self.phase = PushPhase::Attempting;
        match pusher.push(families) {
            Ok(()) => {
                self.retry_count = 0;
                self.phase = PushPhase::Idle;
                FlushStatus::Ok
            }
            Err(err) if self.retry_count < self.max_retries => {
                self.retry_count += 1;
                self.phase = PushPhase::RetryScheduled;
                error!(
                    error = %err,
                    attempt = self.retry_count,
                    "could not push to the gateway, requesting retry"
                );
                FlushStatus::Retry
            }
            Err(err) => {
                self.retry_count = 0;
                self.phase = PushPhase::Exhausted;
                error!(
                    error = %err,
                    "could not push to the gateway, retries exhausted, cycle data is lost"
                );
                FlushStatus::Error
            }
        }
    }

    pub fn retry_count(&self) -> u64 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u64 {
        self.max_retries
    }

    pub fn phase(&self) -> PushPhase {
        self.phase
    }
}
