// =============================================================================
// scanners/mod.rs — WHERE SCANS COME FROM
// =============================================================================
//
// The poller does not care how a scan is performed, only what came back.
// Anything that can turn a condition into a FetchOutcome is a PageClient.
// Production uses the Chartink scanner; tests use a script of outcomes.
// =============================================================================

pub mod chartink_scanner;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{FetchOutcome, ScanCondition};

/// Performs one complete fetch attempt for a scan condition.
///
/// Infallible by signature: every failure along the way must be folded into
/// `FetchOutcome::HttpFailure` or `FetchOutcome::TransportException`.
#[async_trait]
pub trait PageClient: Send + Sync {
    async fn fetch(&self, condition: &ScanCondition) -> FetchOutcome;
}

#[async_trait]
impl<T: PageClient + ?Sized> PageClient for Arc<T> {
    async fn fetch(&self, condition: &ScanCondition) -> FetchOutcome {
        (**self).fetch(condition).await
    }
}
