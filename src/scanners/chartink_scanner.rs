// =============================================================================
// chartink_scanner.rs — THE SCREENER WHISPERER
// =============================================================================
//
// Chartink does not have an API. It has a web page with a scan form, and the
// form posts to /screener/process with a CSRF token lifted from a meta tag.
// So that is what we do:
//
//   1. GET the screener page in a fresh cookie session
//   2. pull `<meta name="csrf-token" content="...">` out of the markup
//   3. POST `scan_clause=<condition>` with the token in `x-csrf-token`
//   4. sort the JSON that comes back into a FetchOutcome
//
// A new session per attempt. If the token went stale between attempts, the
// next attempt picks up a fresh one for free.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::models::{FetchOutcome, ScanCondition, ScanResult, ScreenerResponse};
use crate::scanners::PageClient;

const CSRF_SELECTOR: &str = "[name='csrf-token']";
const CSRF_HEADER: &str = "x-csrf-token";

pub struct ChartinkScanner {
    screener_url: String,
    process_url: String,
    user_agent: String,
    request_timeout: Duration,
}

impl ChartinkScanner {
    pub fn new(config: &Config) -> Self {
        Self {
            screener_url: config.screener_url.clone(),
            process_url: config.process_url.clone(),
            user_agent: config.user_agent.clone(),
            request_timeout: config.request_timeout,
        }
    }

    /// A brand new HTTP session: its own cookie jar, browser User-Agent.
    fn session(&self) -> Result<reqwest::Client, FetchError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(self.user_agent.as_str())
            .timeout(self.request_timeout)
            .build()?;
        Ok(client)
    }

    async fn try_fetch(&self, condition: &ScanCondition) -> Result<FetchOutcome, FetchError> {
        let client = self.session()?;

        let page = client.get(&self.screener_url).send().await?;
        debug!(
            status = page.status().as_u16(),
            url = %self.screener_url,
            "Chartink: screener page fetched"
        );
        let html = page.text().await?;

        let token = extract_csrf_token(&html).ok_or(FetchError::MissingCsrfToken)?;
        debug!("Chartink: csrf token acquired");

        let response = client
            .post(&self.process_url)
            .header(CSRF_HEADER, token)
            .form(&[("scan_clause", condition.as_str())])
            .send()
            .await?;

        let status = response.status().as_u16();
        debug!(status, url = %self.process_url, "Chartink: scan submitted");
        let body = response.text().await?;

        classify_response(status, &body)
    }
}

#[async_trait]
impl PageClient for ChartinkScanner {
    async fn fetch(&self, condition: &ScanCondition) -> FetchOutcome {
        match self.try_fetch(condition).await {
            Ok(outcome) => {
                if let FetchOutcome::Success(result) = &outcome {
                    info!(rows = result.len(), "Chartink: scan matched");
                }
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Chartink: fetch sequence failed");
                FetchOutcome::TransportException(e.to_string())
            }
        }
    }
}

/// Pull the anti-forgery token out of the screener page markup.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(CSRF_SELECTOR).ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr("content")
        .map(str::to_string)
}

/// Sort a scan response into an outcome.
///
/// Status is checked before the body: error pages are HTML, and an HTTP
/// failure should be reported as one rather than as a JSON decode error.
pub fn classify_response(status: u16, body: &str) -> Result<FetchOutcome, FetchError> {
    if status != 200 {
        return Ok(FetchOutcome::HttpFailure(status));
    }

    let parsed: ScreenerResponse = serde_json::from_str(body)?;
    let scan_error = parsed.scan_error_text();

    match (parsed.data, scan_error) {
        (Some(rows), _) if !rows.is_empty() => Ok(FetchOutcome::Success(ScanResult::new(rows))),
        // no data key at all: the scan never ran
        (None, Some(msg)) => Ok(FetchOutcome::ScanError(msg)),
        (_, scan_error) => Ok(FetchOutcome::EmptyResult { scan_error }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<!DOCTYPE html><html><head>
        <meta charset="utf-8">
        <meta name="csrf-token" content="tok-123">
        </head><body><form id="scan"></form></body></html>"#;

    fn scanner_for(server: &MockServer) -> ChartinkScanner {
        let vars: HashMap<&str, String> = HashMap::from([
            ("CHARTINK_SCREENER_URL", format!("{}/screener/", server.uri())),
            ("CHARTINK_PROCESS_URL", format!("{}/screener/process", server.uri())),
            ("CHARTINK_REQUEST_TIMEOUT_SECS", "5".to_string()),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).cloned());
        ChartinkScanner::new(&config)
    }

    async fn mount_page(server: &MockServer, body: &str) {
        Mock::given(method("GET"))
            .and(path("/screener/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_extract_csrf_token() {
        assert_eq!(extract_csrf_token(PAGE).as_deref(), Some("tok-123"));
    }

    #[test]
    fn test_extract_csrf_token_missing() {
        assert_eq!(extract_csrf_token("<html><head></head></html>"), None);
        assert_eq!(
            extract_csrf_token(r#"<meta name="csrf-token">"#),
            None,
            "tag without content attribute carries no token"
        );
    }

    #[test]
    fn test_classify_success() {
        let body = r#"{"draw":1,"data":[{"nsecode":"TCS","close":3890.5}]}"#;
        match classify_response(200, body).unwrap() {
            FetchOutcome::Success(result) => assert_eq!(result.len(), 1),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_empty_with_scan_error() {
        let body = r#"{"data":[],"scan_error":"Invalid clause"}"#;
        assert_eq!(
            classify_response(200, body).unwrap(),
            FetchOutcome::EmptyResult { scan_error: Some("Invalid clause".to_string()) }
        );
    }

    #[test]
    fn test_classify_scan_error_without_data() {
        assert_eq!(
            classify_response(200, r#"{"scan_error":"Unknown indicator"}"#).unwrap(),
            FetchOutcome::ScanError("Unknown indicator".to_string())
        );
    }

    #[test]
    fn test_classify_missing_data_is_empty() {
        assert_eq!(
            classify_response(200, "{}").unwrap(),
            FetchOutcome::EmptyResult { scan_error: None }
        );
    }

    #[test]
    fn test_classify_http_failure_ignores_body() {
        assert_eq!(
            classify_response(503, "<html>down</html>").unwrap(),
            FetchOutcome::HttpFailure(503)
        );
    }

    #[test]
    fn test_classify_bad_json() {
        assert!(matches!(
            classify_response(200, "<html>login</html>"),
            Err(FetchError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_posts_token_and_condition() {
        let server = MockServer::start().await;
        mount_page(&server, PAGE).await;
        Mock::given(method("POST"))
            .and(path("/screener/process"))
            .and(header("x-csrf-token", "tok-123"))
            .and(body_string_contains("scan_clause=close"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"data":[{"nsecode":"INFY"},{"nsecode":"TCS"}]}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = scanner_for(&server)
            .fetch(&ScanCondition::new("close > 100"))
            .await;

        match outcome {
            FetchOutcome::Success(result) => {
                assert_eq!(result.len(), 2);
                assert_eq!(result.rows[0]["nsecode"], "INFY");
                assert_eq!(result.rows[1]["nsecode"], "TCS");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_reports_http_failure() {
        let server = MockServer::start().await;
        mount_page(&server, PAGE).await;
        Mock::given(method("POST"))
            .and(path("/screener/process"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let outcome = scanner_for(&server).fetch(&ScanCondition::new("x")).await;
        assert_eq!(outcome, FetchOutcome::HttpFailure(500));
    }

    #[tokio::test]
    async fn test_fetch_without_token_is_transport_exception() {
        let server = MockServer::start().await;
        mount_page(&server, "<html><head></head><body>maintenance</body></html>").await;

        let outcome = scanner_for(&server).fetch(&ScanCondition::new("x")).await;
        match outcome {
            FetchOutcome::TransportException(msg) => assert!(msg.contains("csrf-token")),
            other => panic!("expected transport exception, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_transport_exception() {
        let server = MockServer::start().await;
        let scanner = scanner_for(&server);
        drop(server);

        let outcome = scanner.fetch(&ScanCondition::new("x")).await;
        assert!(matches!(outcome, FetchOutcome::TransportException(_)));
    }
}
