use crate::listener::{Direction, EventHandler, HandlerExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_LOG_TTL_MS: u64 = 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// How long fired events stay in the log.
    pub log_ttl_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            log_ttl_ms: DEFAULT_LOG_TTL_MS,
        }
    }
}

impl BusConfig {
    pub fn log_ttl(&self) -> Duration {
        Duration::from_millis(self.log_ttl_ms)
    }
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// Persisted form of a filter chain. Every field is optional; unset fields
/// leave the corresponding filter out.
///
/// Durations are whole milliseconds under `debounce_ms` and `ttl_ms`. Bare
/// `debounce` and `ttl` keys hold nanosecond counts in older stores and are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "is_zero")]
    pub max_calls: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub ttl_ms: u64,
}

impl ListenerConfig {
    /// Wraps `handler`, innermost first: debounce, range, threshold or
    /// direction, max calls, timeout.
    ///
    /// A direction with both trigger and reset values becomes a threshold;
    /// a range needs both bounds.
    pub fn wrap(&self, handler: impl EventHandler + 'static) -> Arc<dyn EventHandler> {
        let mut chain = handler.boxed();
        if let Some(ms) = self.debounce_ms {
            chain = chain.with_debounce(Duration::from_millis(ms)).boxed();
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            chain = chain.with_range(min, max).boxed();
        }
        if let Some(direction) = self.direction {
            chain = match (self.trigger_value, self.reset_value) {
                (Some(trigger), Some(reset)) => {
                    chain.with_threshold(direction, trigger, reset).boxed()
                }
                _ => chain.with_direction(direction).boxed(),
            };
        }
        let max_calls = usize::try_from(self.max_calls).unwrap_or(usize::MAX);
        chain
            .with_times(max_calls)
            .with_timeout(Duration::from_millis(self.ttl_ms))
            .shared()
    }
}
