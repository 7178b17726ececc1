// Test doubles for the PageClient and Notifier seams.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::NotifyError;
use crate::models::{FetchOutcome, ScanCondition, ScanResult, ScanRow};
use crate::notifier::Notifier;
use crate::scanners::PageClient;

/// Hands out a fixed script of outcomes, one per fetch.
pub struct ScriptedClient {
    script: Mutex<VecDeque<FetchOutcome>>,
    calls: Mutex<u32>,
}

impl ScriptedClient {
    pub fn new(script: Vec<FetchOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        })
    }

    pub fn repeat(outcome: FetchOutcome, times: usize) -> Arc<Self> {
        Self::new(vec![outcome; times])
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PageClient for ScriptedClient {
    async fn fetch(&self, _condition: &ScanCondition) -> FetchOutcome {
        *self.calls.lock().unwrap() += 1;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("fetch called more often than scripted")
    }
}

/// Records every message; optionally rejects them all after recording.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true, ..Default::default() })
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(NotifyError::Api { status: 401, description: "Unauthorized".into() });
        }
        Ok(())
    }
}

pub fn row(value: Value) -> ScanRow {
    match value {
        Value::Object(map) => map,
        other => panic!("row must be an object, got {other}"),
    }
}

/// A successful outcome with `n` rows named SYM0, SYM1, ...
pub fn rows(n: usize) -> FetchOutcome {
    let rows = (0..n)
        .map(|i| row(json!({"nsecode": format!("SYM{i}"), "close": 100 + i})))
        .collect();
    FetchOutcome::Success(ScanResult::new(rows))
}
