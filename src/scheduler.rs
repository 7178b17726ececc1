// =============================================================================
// scheduler.rs — THE ALARM CLOCK
// =============================================================================
//
// The screener is most useful once a day, shortly before the market data
// settles. So we check the wall clock on a fixed interval and fire a run when
// the local time (at a fixed UTC offset, IST by default) hits one specific
// minute of the day.
//
// The run is awaited inside the tick. While it is in flight no further ticks
// are looked at, and missed ticks are delayed rather than replayed in a
// burst, so two runs can never overlap. A run fires at most once per local
// calendar day even if the check interval is much shorter than a minute.
// =============================================================================

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::Config;
use crate::notifier::Notifier;
use crate::poller::ScreenerPoller;
use crate::scanners::PageClient;

/// Fires on one minute of the day in a fixed-offset local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    hour: u32,
    minute: u32,
    offset: FixedOffset,
}

impl DailyTrigger {
    pub fn new(at: NaiveTime, offset: FixedOffset) -> Self {
        Self {
            hour: at.hour(),
            minute: at.minute(),
            offset,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.schedule_time, config.schedule_offset)
    }

    pub fn local(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.offset)
    }

    /// True during the configured minute, local time.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let local = self.local(now);
        local.hour() == self.hour && local.minute() == self.minute
    }

    /// `is_due`, but at most once per local date. Records the date it fires on.
    pub fn should_fire(&self, now: DateTime<Utc>, last_fired: &mut Option<NaiveDate>) -> bool {
        if !self.is_due(now) {
            return false;
        }
        let today = self.local(now).date_naive();
        if *last_fired == Some(today) {
            return false;
        }
        *last_fired = Some(today);
        true
    }
}

impl std::fmt::Display for DailyTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02} (UTC{})", self.hour, self.minute, self.offset)
    }
}

/// Check `clock` every `check_interval` and run the poller when the trigger
/// is due. Returns when `shutdown` flips or its sender goes away.
pub async fn run_scheduled<C, N, F>(
    poller: &ScreenerPoller<C, N>,
    trigger: DailyTrigger,
    check_interval: Duration,
    clock: F,
    shutdown: &mut watch::Receiver<bool>,
) where
    C: PageClient,
    N: Notifier,
    F: Fn() -> DateTime<Utc>,
{
    info!(
        trigger = %trigger,
        check_interval_secs = check_interval.as_secs(),
        "Scheduler online"
    );

    let mut ticker = tokio::time::interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_fired: Option<NaiveDate> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = clock();
                if trigger.should_fire(now, &mut last_fired) {
                    info!(local_time = %trigger.local(now).format("%Y-%m-%d %H:%M"), "Running scheduled job");
                    let report = poller.run_once().await;
                    info!(run_id = %report.run_id, state = ?report.state, "Scheduled job done");
                } else {
                    debug!(local_time = %trigger.local(now).format("%H:%M:%S"), "Not due");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Scheduler received shutdown signal");
                    break;
                }
            }
        }
    }

    info!("Scheduler offline");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsCollector;
    use crate::testing::{rows, RecordingNotifier, ScriptedClient};
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    fn trigger() -> DailyTrigger {
        DailyTrigger::new(NaiveTime::from_hms_opt(23, 40, 0).unwrap(), ist())
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_due_at_configured_local_minute() {
        // 18:10 UTC is 23:40 IST
        assert!(trigger().is_due(utc(2026, 3, 2, 18, 10, 0)));
        assert!(trigger().is_due(utc(2026, 3, 2, 18, 10, 59)));
        assert!(!trigger().is_due(utc(2026, 3, 2, 18, 11, 0)));
        assert!(!trigger().is_due(utc(2026, 3, 2, 23, 40, 0)));
    }

    #[test]
    fn test_offset_crossing_midnight() {
        let trigger = DailyTrigger::new(NaiveTime::from_hms_opt(0, 15, 0).unwrap(), ist());
        // 18:45 UTC on the 1st is 00:15 IST on the 2nd
        let now = utc(2026, 3, 1, 18, 45, 0);
        assert!(trigger.is_due(now));
        assert_eq!(trigger.local(now).date_naive(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn test_fires_once_per_day() {
        let mut last = None;
        assert!(trigger().should_fire(utc(2026, 3, 2, 18, 10, 0), &mut last));
        assert!(!trigger().should_fire(utc(2026, 3, 2, 18, 10, 30), &mut last));
        assert!(trigger().should_fire(utc(2026, 3, 3, 18, 10, 5), &mut last));
    }

    #[test]
    fn test_display() {
        assert_eq!(trigger().to_string(), "23:40 (UTC+05:30)");
    }

    fn poller(
        client: Arc<ScriptedClient>,
        notifier: Arc<RecordingNotifier>,
    ) -> ScreenerPoller<Arc<ScriptedClient>, Arc<RecordingNotifier>> {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CHARTINK_CONDITION", "x"),
            ("TELEGRAM_TOKEN", "t"),
            ("TELEGRAM_CHAT_ID", "1"),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        ScreenerPoller::new(&config, client, notifier, Arc::new(MetricsCollector::new())).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_once_while_due_then_stops() {
        let client = ScriptedClient::new(vec![rows(1)]);
        let notifier = RecordingNotifier::new();
        let poller = poller(client.clone(), notifier.clone());
        let (tx, mut rx) = watch::channel(false);

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(5_500)).await;
            let _ = tx.send(true);
        };
        let clock = || utc(2026, 3, 2, 18, 10, 0);

        tokio::join!(
            run_scheduled(&poller, trigger(), Duration::from_secs(1), clock, &mut rx),
            stopper,
        );

        assert_eq!(client.calls(), 1);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_idles_when_not_due() {
        // An empty script panics if fetch is ever called.
        let client = ScriptedClient::new(vec![]);
        let notifier = RecordingNotifier::new();
        let poller = poller(client.clone(), notifier.clone());
        let (tx, mut rx) = watch::channel(false);

        let stopper = async {
            tokio::time::sleep(Duration::from_secs(300)).await;
            let _ = tx.send(true);
        };
        let clock = || utc(2026, 3, 2, 9, 0, 0);

        tokio::join!(
            run_scheduled(&poller, trigger(), Duration::from_secs(60), clock, &mut rx),
            stopper,
        );

        assert_eq!(client.calls(), 0);
        assert!(notifier.sent().is_empty());
    }
}
