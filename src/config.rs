// =============================================================================
// config.rs — THE CONFIGURATION CATHEDRAL (CHAPEL EDITION)
// =============================================================================
//
// Everything tunable lives here and everything comes from the environment.
// A `.env` file is honored if one exists.
//
// Three values are required: the scan condition, the bot token and the chat
// id. Without them every request fails downstream, so `validate` refuses to
// let the poller be built at all. Everything else has a default that matches
// what the screener and Telegram expect today.
// =============================================================================

use std::env;
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use tracing::{debug, error};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_SCREENER_URL: &str = "https://chartink.com/screener/";
pub const DEFAULT_PROCESS_URL: &str = "https://chartink.com/screener/process";
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";
pub const DEFAULT_MESSAGE_TITLE: &str =
    "Swing trading - Target 5%(Activate trailing stop loss once it reaches 4%) and SL 1%";

/// How the process spends its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One run, then exit.
    Once,
    /// Optional run on startup, then wait for the daily trigger forever.
    Scheduled,
}

impl RunMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "once" => Some(RunMode::Once),
            "scheduled" | "schedule" => Some(RunMode::Scheduled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // REQUIRED
    // =========================================================================

    /// The screener scan clause, sent verbatim as `scan_clause`.
    pub scan_condition: String,

    /// Telegram bot token. Never logged.
    pub telegram_token: String,

    /// Destination chat id (numeric id or @channel name).
    pub telegram_chat_id: String,

    // =========================================================================
    // ENDPOINTS
    // =========================================================================

    /// Page carrying the `csrf-token` meta tag.
    pub screener_url: String,

    /// Endpoint the scan clause is POSTed to.
    pub process_url: String,

    /// Telegram bot API base, overridable for tests and proxies.
    pub telegram_api_base: String,

    pub user_agent: String,

    // =========================================================================
    // RETRY POLICY
    // =========================================================================

    /// Attempts per run. Default: 3.
    pub max_attempts: u32,

    /// Sleep after each attempt that did not finish the run. Default: 10s.
    pub retry_delay: Duration,

    /// Per-request HTTP timeout. Default: 20s.
    pub request_timeout: Duration,

    /// First line of every successful scan message.
    pub message_title: String,

    // =========================================================================
    // SCHEDULING
    // =========================================================================

    pub run_mode: RunMode,

    /// In scheduled mode, run once immediately before waiting for the trigger.
    pub run_on_startup: bool,

    /// Minute of day the scheduled run fires at, in `schedule_offset` time.
    pub schedule_time: NaiveTime,

    /// Fixed UTC offset the schedule time is expressed in. Default: +05:30.
    pub schedule_offset: FixedOffset,

    /// How often the scheduler checks the wall clock. Default: 60s.
    pub schedule_check_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    ///
    /// Never fails: unparseable numbers fall back to their defaults and
    /// missing required values come through as empty strings for
    /// `validate` to reject.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`. Keeps tests
    /// away from the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let schedule_time = NaiveTime::parse_from_str(
            &or_default("CHARTINK_SCHEDULE_TIME", "23:40"),
            "%H:%M",
        )
        .unwrap_or_else(|_| default_schedule_time());

        let offset_minutes: i32 = or_default("CHARTINK_SCHEDULE_UTC_OFFSET_MINUTES", "330")
            .parse()
            .unwrap_or(330);
        let schedule_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(default_schedule_offset);

        Config {
            scan_condition: or_default("CHARTINK_CONDITION", ""),
            telegram_token: or_default("TELEGRAM_TOKEN", ""),
            telegram_chat_id: or_default("TELEGRAM_CHAT_ID", ""),

            screener_url: or_default("CHARTINK_SCREENER_URL", DEFAULT_SCREENER_URL),
            process_url: or_default("CHARTINK_PROCESS_URL", DEFAULT_PROCESS_URL),
            telegram_api_base: or_default("TELEGRAM_API_BASE", DEFAULT_TELEGRAM_API_BASE),
            user_agent: or_default("CHARTINK_USER_AGENT", DEFAULT_USER_AGENT),

            max_attempts: or_default("CHARTINK_MAX_ATTEMPTS", "3").parse().unwrap_or(3),
            retry_delay: Duration::from_secs(
                or_default("CHARTINK_RETRY_DELAY_SECS", "10").parse().unwrap_or(10),
            ),
            request_timeout: Duration::from_secs(
                or_default("CHARTINK_REQUEST_TIMEOUT_SECS", "20").parse().unwrap_or(20),
            ),
            message_title: or_default("CHARTINK_MESSAGE_TITLE", DEFAULT_MESSAGE_TITLE),

            run_mode: RunMode::parse(&or_default("CHARTINK_RUN_MODE", "scheduled"))
                .unwrap_or(RunMode::Scheduled),
            run_on_startup: or_default("CHARTINK_RUN_ON_STARTUP", "true")
                .parse()
                .unwrap_or(true),
            schedule_time,
            schedule_offset,
            schedule_check_interval: Duration::from_secs(
                or_default("CHARTINK_SCHEDULE_CHECK_SECS", "60").parse().unwrap_or(60),
            ),
        }
    }

    /// Check the values the poller cannot work without.
    ///
    /// Every problem is logged at `error!`; the first one is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        for (var, value) in [
            ("CHARTINK_CONDITION", &self.scan_condition),
            ("TELEGRAM_TOKEN", &self.telegram_token),
            ("TELEGRAM_CHAT_ID", &self.telegram_chat_id),
        ] {
            if value.trim().is_empty() {
                error!(var, "required configuration is not set");
                problems.push(ConfigError::Missing { var });
            } else {
                debug!(var, "required configuration is set");
            }
        }

        for (var, value) in [
            ("CHARTINK_SCREENER_URL", &self.screener_url),
            ("CHARTINK_PROCESS_URL", &self.process_url),
            ("TELEGRAM_API_BASE", &self.telegram_api_base),
        ] {
            if Url::parse(value).is_err() {
                error!(var, value = %value, "configured URL does not parse");
                problems.push(ConfigError::Invalid { var, value: value.clone() });
            }
        }

        if self.max_attempts == 0 {
            error!("CHARTINK_MAX_ATTEMPTS must be at least 1");
            problems.push(ConfigError::Invalid {
                var: "CHARTINK_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        if self.schedule_check_interval.is_zero() {
            error!("CHARTINK_SCHEDULE_CHECK_SECS must be at least 1");
            problems.push(ConfigError::Invalid {
                var: "CHARTINK_SCHEDULE_CHECK_SECS",
                value: "0".to_string(),
            });
        }

        match problems.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}

fn default_schedule_time() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 40, 0).unwrap_or(NaiveTime::MIN)
}

fn default_schedule_offset() -> FixedOffset {
    FixedOffset::east_opt(330 * 60).unwrap_or_else(|| Utc.fix())
}
