// =============================================================================
// poller.rs — THE RETRY-AND-ESCALATE ENGINE
// =============================================================================
//
// One run = up to N attempts of fetch, classify, notify.
//
// The whole policy is two small tables:
//
//   outcome              -> messages sent                         -> disposition
//   --------------------    -----------------------------------     -----------
//   Success(rows > 0)       "Chartink Data:\n<title>\n<pre>..."      Finish
//   EmptyResult             "No new data available." [+ scan error]  Retry
//   ScanError               "No new data available." + scan error    Retry
//   HttpFailure(code)       "Failed to fetch data with status ..."   Retry
//   TransportException      "Exception during data fetch: ..."       Retry
//
// Retry means: sleep the retry delay, then try again if attempts remain.
// Running out of attempts sends "All retries failed". Nothing in here ever
// returns an error to the caller; the chat is the only place failures go.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ConfigError;
use crate::format;
use crate::metrics::MetricsCollector;
use crate::models::{FetchOutcome, ScanCondition};
use crate::notifier::Notifier;
use crate::scanners::PageClient;

pub const NO_DATA_MESSAGE: &str = "No new data available.";
pub const ALL_RETRIES_FAILED_MESSAGE: &str = "All retries failed";

/// Whether an outcome ends the run or burns an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Finish,
    Retry,
}

/// Where a run is in its life. `Succeeded` and `Exhausted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Attempting,
    Succeeded,
    Exhausted,
}

/// What happened during one `run_once`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub attempts: u32,
    pub delays: u32,
    pub notifications_sent: u32,
    pub notification_failures: u32,
    pub state: RunState,
}

impl RunReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            attempts: 0,
            delays: 0,
            notifications_sent: 0,
            notification_failures: 0,
            state: RunState::Attempting,
        }
    }
}

pub fn disposition(outcome: &FetchOutcome) -> Disposition {
    match outcome {
        FetchOutcome::Success(result) if !result.is_empty() => Disposition::Finish,
        _ => Disposition::Retry,
    }
}

pub struct ScreenerPoller<C, N> {
    client: C,
    notifier: N,
    condition: ScanCondition,
    title: String,
    max_attempts: u32,
    retry_delay: Duration,
    metrics: Arc<MetricsCollector>,
}

impl<C: PageClient, N: Notifier> ScreenerPoller<C, N> {
    /// Build a poller. Fails if the configuration is missing anything the
    /// poller cannot run without.
    pub fn new(
        config: &Config,
        client: C,
        notifier: N,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            client,
            notifier,
            condition: ScanCondition::new(config.scan_condition.clone()),
            title: config.message_title.clone(),
            max_attempts: config.max_attempts,
            retry_delay: config.retry_delay,
            metrics,
        })
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Run the fetch-classify-notify loop until a non-empty scan comes back
    /// or attempts run out.
    pub async fn run_once(&self) -> RunReport {
        let mut report = RunReport::new();
        let span = info_span!("run_once", run_id = %report.run_id);

        async {
            self.metrics.increment_runs_started();
            info!(
                max_attempts = self.max_attempts,
                retry_delay_secs = self.retry_delay.as_secs(),
                "Screener run starting"
            );

            for attempt in 1..=self.max_attempts {
                report.attempts = attempt;
                self.metrics.increment_attempts();

                let outcome = normalize(
                    self.client
                        .fetch(&self.condition)
                        .instrument(info_span!("attempt", attempt))
                        .await,
                );
                self.metrics.record_outcome(&outcome);
                debug!(attempt, outcome = outcome.kind(), "Attempt classified");

                log_outcome(attempt, &outcome);
                for message in self.messages_for(&outcome) {
                    self.notify(&message, &mut report).await;
                }

                match disposition(&outcome) {
                    Disposition::Finish => {
                        report.state = RunState::Succeeded;
                        self.metrics.increment_runs_succeeded();
                        info!(attempt, "Screener run succeeded");
                        return;
                    }
                    Disposition::Retry => {
                        debug!(
                            attempt,
                            delay_secs = self.retry_delay.as_secs(),
                            "Waiting before next attempt"
                        );
                        tokio::time::sleep(self.retry_delay).await;
                        report.delays += 1;
                    }
                }
            }

            error!(attempts = report.attempts, "All retries failed");
            self.notify(ALL_RETRIES_FAILED_MESSAGE, &mut report).await;
            report.state = RunState::Exhausted;
            self.metrics.increment_runs_exhausted();
        }
        .instrument(span)
        .await;

        match serde_json::to_string(&self.metrics.snapshot()) {
            Ok(json) => info!(metrics = %json, state = ?report.state, "Screener run finished"),
            Err(e) => warn!(error = %e, "Failed to serialize metrics snapshot"),
        }

        report
    }

    /// The chat messages an outcome produces, in send order.
    pub fn messages_for(&self, outcome: &FetchOutcome) -> Vec<String> {
        match outcome {
            FetchOutcome::Success(result) => {
                vec![format::render_scan_message(&self.title, result)]
            }
            FetchOutcome::EmptyResult { scan_error } => {
                let mut messages = vec![NO_DATA_MESSAGE.to_string()];
                if let Some(msg) = scan_error {
                    messages.push(scan_error_message(msg));
                }
                messages
            }
            FetchOutcome::ScanError(msg) => {
                vec![NO_DATA_MESSAGE.to_string(), scan_error_message(msg)]
            }
            FetchOutcome::HttpFailure(code) => {
                vec![format!("Failed to fetch data with status code: {code}")]
            }
            FetchOutcome::TransportException(msg) => {
                vec![format!("Exception during data fetch: {}", format::escape(msg))]
            }
        }
    }

    /// Deliver one message. A failed delivery is logged and counted, never
    /// retried, never fatal.
    async fn notify(&self, text: &str, report: &mut RunReport) {
        match self.notifier.send(text).await {
            Ok(()) => {
                report.notifications_sent += 1;
                self.metrics.increment_notifications_sent();
            }
            Err(e) => {
                report.notification_failures += 1;
                self.metrics.increment_notification_failures();
                warn!(error = %e, "Notification could not be delivered, dropping it");
            }
        }
    }
}

/// A "success" with no rows is an empty result by another name.
fn normalize(outcome: FetchOutcome) -> FetchOutcome {
    match outcome {
        FetchOutcome::Success(result) if result.is_empty() => {
            FetchOutcome::EmptyResult { scan_error: None }
        }
        other => other,
    }
}

fn scan_error_message(msg: &str) -> String {
    format!("Scan error: {}", format::escape(msg))
}

fn log_outcome(attempt: u32, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Success(result) => {
            info!(attempt, rows = result.len(), "Data received");
        }
        FetchOutcome::EmptyResult { scan_error } => {
            info!(attempt, "No new data available");
            if let Some(msg) = scan_error {
                error!(attempt, scan_error = %msg, "Scan error");
            }
        }
        FetchOutcome::ScanError(msg) => {
            error!(attempt, scan_error = %msg, "Scan error");
        }
        FetchOutcome::HttpFailure(code) => {
            error!(attempt, status = code, "Failed to fetch data");
        }
        FetchOutcome::TransportException(msg) => {
            error!(attempt, error = %msg, "Exception during data fetch");
        }
    }
}
