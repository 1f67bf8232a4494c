mod from_fn;
mod handler_ref;
mod with_debounce;
mod with_direction;
mod with_range;
mod with_threshold;
mod with_timeout;
mod with_times;

use crate::error::HandlerError;
use crate::event::Event;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub use from_fn::*;
pub use handler_ref::*;
pub use with_debounce::*;
pub use with_direction::*;
pub use with_range::*;
pub use with_threshold::*;
pub use with_timeout::*;
pub use with_times::*;

/// Identity of a handler, used to find it again in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(Uuid);

impl HandlerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A callback registered on a bus, possibly wrapped in filters.
///
/// Filter state is not meant to be shared by concurrent dispatches: a
/// filtered handler registered under several event types that fire at the
/// same time may admit more events than its conditions describe.
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn id(&self) -> HandlerId;

    async fn call(&self, event: &Event) -> Result<(), HandlerError>;

    /// Whether the handler should be retired permanently.
    fn expired(&self) -> bool;

    fn last_error(&self) -> Option<String>;
}

#[async_trait]
impl<H: EventHandler + ?Sized> EventHandler for Arc<H> {
    fn id(&self) -> HandlerId {
        (**self).id()
    }

    async fn call(&self, event: &Event) -> Result<(), HandlerError> {
        (**self).call(event).await
    }

    fn expired(&self) -> bool {
        (**self).expired()
    }

    fn last_error(&self) -> Option<String> {
        (**self).last_error()
    }
}

#[async_trait]
impl<H: EventHandler + ?Sized> EventHandler for Box<H> {
    fn id(&self) -> HandlerId {
        (**self).id()
    }

    async fn call(&self, event: &Event) -> Result<(), HandlerError> {
        (**self).call(event).await
    }

    fn expired(&self) -> bool {
        (**self).expired()
    }

    fn last_error(&self) -> Option<String> {
        (**self).last_error()
    }
}

pub trait HandlerExt: EventHandler + Sized + 'static {
    fn with_times(self, times: usize) -> WithTimes<Self> {
        WithTimes::new(times, self)
    }

    fn with_timeout(self, ttl: Duration) -> WithTimeout<Self> {
        WithTimeout::new(ttl, self)
    }

    fn with_direction(self, direction: Direction) -> WithDirection<Self> {
        WithDirection::new(direction, self)
    }

    fn with_threshold(self, direction: Direction, trigger: f64, reset: f64) -> WithThreshold<Self> {
        WithThreshold::new(direction, trigger, reset, self)
    }

    fn with_range(self, min: f64, max: f64) -> WithRange<Self> {
        WithRange::new(min, max, self)
    }

    fn with_debounce(self, ttl: Duration) -> WithDebounce<Self> {
        WithDebounce::new(ttl, self)
    }

    fn boxed(self) -> Box<dyn EventHandler> {
        Box::new(self)
    }

    fn shared(self) -> Arc<dyn EventHandler> {
        Arc::new(self)
    }
}

impl<H: EventHandler + 'static> HandlerExt for H {}

// Saturates instead of overflowing for absurdly long spans.
pub(crate) fn offset(time: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(span)
        .ok()
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Value of a value event, or why the event cannot be evaluated numerically.
pub(crate) fn reading(event: &Event) -> Result<f64, HandlerError> {
    match event.value() {
        Some(value) if value.is_nan() => Err(HandlerError::Ignored),
        Some(value) => Ok(value),
        None => Err(HandlerError::IncompatibleEvent),
    }
}
