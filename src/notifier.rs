// =============================================================================
// notifier.rs — THE TELEGRAM TOWN CRIER
// =============================================================================
//
// Every outcome of every attempt ends up as a chat message. Good news, bad
// news, no news: the chat hears about it. This module is the mouth.
//
// Messages go out in Telegram's HTML parse mode so scan tables can sit in a
// <pre> block. Telegram caps a message at 4096 characters, and a busy scan
// blows past that, so long messages are cut on line boundaries. A <pre>
// block that straddles a cut is closed and reopened so each piece still
// parses.
// =============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::error::NotifyError;
use crate::models::TelegramResponse;

/// Telegram's hard limit on message text length, in characters.
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

const PRE_OPEN: &str = "<pre>";
const PRE_CLOSE: &str = "</pre>";

/// Delivers a text message to one preconfigured destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        (**self).send(text).await
    }
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &Config) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_base: config.telegram_api_base.trim_end_matches('/').to_string(),
            token: config.telegram_token.clone(),
            chat_id: config.telegram_chat_id.clone(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    async fn send_chunk(&self, chunk: &str) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": chunk,
            "parse_mode": "HTML",
        });

        let response = self
            .client
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let parsed: Option<TelegramResponse> = serde_json::from_str(&text).ok();

        match parsed {
            Some(reply) if reply.ok && (200..300).contains(&status) => {
                debug!(chars = chunk.chars().count(), "Telegram: message delivered");
                Ok(())
            }
            Some(reply) => Err(NotifyError::Api {
                status,
                description: reply.description.unwrap_or_else(|| "unknown error".to_string()),
            }),
            None => Err(NotifyError::Api { status, description: text }),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_CHARS) {
            self.send_chunk(&chunk).await?;
        }
        Ok(())
    }
}

/// Split `message` into pieces of at most `max_chars` characters.
///
/// Cuts fall on line boundaries where possible; a single line longer than
/// the limit is hard-cut. A `<pre>` block left open at a cut is closed in
/// that piece and reopened at the start of the next.
pub fn split_message(message: &str, max_chars: usize) -> Vec<String> {
    if message.chars().count() <= max_chars {
        return vec![message.to_string()];
    }

    // Room for a reopened <pre> at the front and a closing </pre> at the back.
    let reserve = PRE_OPEN.len() + PRE_CLOSE.len();
    let budget = max_chars.saturating_sub(reserve).max(1);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut in_pre = false;

    let mut flush = |current: &mut String, current_len: &mut usize, in_pre: bool| {
        if current.is_empty() {
            return;
        }
        if in_pre {
            current.push_str(PRE_CLOSE);
        }
        chunks.push(std::mem::take(current));
        *current_len = 0;
        if in_pre {
            current.push_str(PRE_OPEN);
            *current_len = PRE_OPEN.len();
        }
    };

    for line in message.split_inclusive('\n') {
        for piece in hard_wrap(line, budget) {
            let piece_len = piece.chars().count();
            let has_content = current_len > if in_pre { PRE_OPEN.len() } else { 0 };
            if current_len + piece_len > budget && has_content {
                flush(&mut current, &mut current_len, in_pre);
            }
            current.push_str(&piece);
            current_len += piece_len;
            in_pre = pre_state_after(&piece, in_pre);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn hard_wrap(line: &str, budget: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + budget).min(chars.len());
        if end < chars.len() {
            if let Some(cut) = markup_safe_cut(&chars[start..end]) {
                end = start + cut;
            }
        }
        pieces.push(chars[start..end].iter().collect());
        start = end;
    }
    pieces
}

/// Where to cut `window` so an `&...;` entity or `<...>` tag left open at its
/// end moves whole into the next piece. `None` keeps the cut at the end.
fn markup_safe_cut(window: &[char]) -> Option<usize> {
    let open = window.iter().rposition(|&c| c == '&' || c == '<')?;
    let close = if window[open] == '&' { ';' } else { '>' };
    if window[open..].contains(&close) {
        return None;
    }
    // an opener at 0 spans the whole budget; cutting there would never advance
    (open > 0).then_some(open)
}

fn pre_state_after(text: &str, mut in_pre: bool) -> bool {
    let mut rest = text;
    loop {
        let tag = if in_pre { PRE_CLOSE } else { PRE_OPEN };
        match rest.find(tag) {
            Some(idx) => {
                in_pre = !in_pre;
                rest = &rest[idx + tag.len()..];
            }
            None => return in_pre,
        }
    }
}
