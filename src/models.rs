// =============================================================================
// models.rs — THE SHAPES OF A SCAN
// =============================================================================
//
// A scan goes in as a condition string and comes out as a FetchOutcome.
// Nothing here outlives a single attempt: rows are rendered into a chat
// message and dropped on the floor.
// =============================================================================

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// The screener query expression. Opaque to us; sent verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCondition(String);

impl ScanCondition {
    pub fn new(condition: impl Into<String>) -> Self {
        Self(condition.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One screener row. Column order is the order the screener sent the keys
/// in (`serde_json` is built with `preserve_order`).
pub type ScanRow = Map<String, Value>;

/// Ordered rows from one successful scan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanResult {
    pub rows: Vec<ScanRow>,
}

impl ScanResult {
    pub fn new(rows: Vec<ScanRow>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// The classified result of one fetch attempt. Exactly one per attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The scan matched at least one instrument.
    Success(ScanResult),

    /// HTTP 200, but the scan matched nothing. The screener sometimes
    /// explains why in `scan_error`.
    EmptyResult { scan_error: Option<String> },

    /// Server-reported scan error without an accompanying empty result.
    ScanError(String),

    /// The scan POST came back with something other than 200.
    HttpFailure(u16),

    /// Anything that blew up along the way: network, missing token, junk
    /// JSON.
    TransportException(String),
}

impl FetchOutcome {
    /// Short tag for log fields and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::EmptyResult { .. } => "empty_result",
            FetchOutcome::ScanError(_) => "scan_error",
            FetchOutcome::HttpFailure(_) => "http_failure",
            FetchOutcome::TransportException(_) => "transport_exception",
        }
    }
}

/// What the screener's process endpoint returns. Only the two fields we
/// branch on; everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ScreenerResponse {
    #[serde(default)]
    pub data: Option<Vec<ScanRow>>,

    #[serde(default)]
    pub scan_error: Option<Value>,
}

impl ScreenerResponse {
    /// The scan error as display text. The screener has been seen sending
    /// both strings and structured values here.
    pub fn scan_error_text(&self) -> Option<String> {
        match &self.scan_error {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Telegram bot API envelope. `description` is only present when `ok` is false.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramResponse {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screener_response_keeps_column_order() {
        let body = r#"{"data":[{"nsecode":"TCS","close":3890.5,"per_chg":1.2}]}"#;
        let parsed: ScreenerResponse = serde_json::from_str(body).unwrap();
        let rows = parsed.data.unwrap();
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["nsecode", "close", "per_chg"]);
    }

    #[test]
    fn test_scan_error_text_variants() {
        let s: ScreenerResponse = serde_json::from_str(r#"{"scan_error":"bad clause"}"#).unwrap();
        assert_eq!(s.scan_error_text().as_deref(), Some("bad clause"));

        let n: ScreenerResponse = serde_json::from_str(r#"{"scan_error":null}"#).unwrap();
        assert_eq!(n.scan_error_text(), None);

        let o: ScreenerResponse = serde_json::from_str(r#"{"scan_error":{"line":3}}"#).unwrap();
        assert_eq!(o.scan_error_text().as_deref(), Some(r#"{"line":3}"#));
    }

    #[test]
    fn test_outcome_kind() {
        assert_eq!(FetchOutcome::HttpFailure(502).kind(), "http_failure");
        assert_eq!(FetchOutcome::EmptyResult { scan_error: None }.kind(), "empty_result");
    }
}
