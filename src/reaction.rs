use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use rand::seq::IndexedRandom;
use teloxide::types::ChatId;
use tracing::debug;

use crate::config::Config;
use crate::triggers::TriggerTables;

/// Last time an exact-phrase reply was sent, shared by every chat.
#[derive(Debug)]
pub struct RateLimiter {
    last_fired: AtomicI64,
}

impl RateLimiter {
    pub fn starting_at(now: i64) -> Self {
        Self {
            last_fired: AtomicI64::new(now),
        }
    }

    /// Record a firing at `now` if more than `rate_seconds` elapsed since the
    /// last one. Check and update happen in one atomic step.
    pub fn try_fire(&self, now: i64, rate_seconds: f64) -> bool {
        self.last_fired
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                (now.saturating_sub(last) as f64 > rate_seconds).then_some(now)
            })
            .is_ok()
    }

    #[cfg(test)]
    pub fn last_fired(&self) -> i64 {
        self.last_fired.load(Ordering::SeqCst)
    }
}

/// Strip a leading "dy" or "di" and return what remains.
///
/// With the dictionary on, only tokens listed in the allowed words react.
/// Empty suffixes and the bare "t" (from "dit") never react.
pub fn word_reaction<'a>(token: &'a str, config: &Config) -> Option<&'a str> {
    let suffix = token
        .strip_prefix("dy")
        .or_else(|| token.strip_prefix("di"))?;

    if config.use_dictionary && !config.allowed_words.contains(token) {
        return None;
    }

    match suffix {
        "" | "t" => None,
        suffix => Some(suffix),
    }
}

/// Decides which replies an incoming text message gets.
pub struct ReactionEngine {
    config: Arc<Config>,
    tables: TriggerTables,
    limiter: RateLimiter,
}

impl ReactionEngine {
    pub fn new(config: Arc<Config>, tables: TriggerTables, limiter: RateLimiter) -> Self {
        Self {
            config,
            tables,
            limiter,
        }
    }

    pub fn tables(&self) -> &TriggerTables {
        &self.tables
    }

    #[cfg(test)]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Replies for `message`, in order: substring alerts, then at most one
    /// exact-phrase reply, then word reactions left to right.
    pub fn react(&self, message: &str, chat_id: ChatId, now: i64) -> Vec<String> {
        if !self.config.is_allowed(chat_id) {
            return Vec::new();
        }

        let message = message.to_lowercase();
        let mut replies = Vec::new();

        for alert in self.tables.substring_alerts() {
            if message.contains(alert.keyword.as_str()) {
                debug!("Alert keyword '{}' matched in chat {}", alert.keyword, chat_id.0);
                replies.push(alert.text.clone());
            }
        }

        for entry in self.tables.exact_phrases() {
            if message == entry.phrase && self.limiter.try_fire(now, self.config.rate_seconds) {
                if let Some(reply) = entry.replies.choose(&mut rand::rng()) {
                    debug!("Exact phrase '{}' fired in chat {}", entry.phrase, chat_id.0);
                    replies.push(reply.clone());
                }
            }
        }

        for token in message.split(' ') {
            if let Some(suffix) = word_reaction(token, &self.config) {
                replies.push(suffix.to_string());
            }
        }

        replies
    }
}
