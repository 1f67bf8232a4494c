use crate::error::HandlerError;
use crate::event::Event;
use crate::listener::{EventHandler, HandlerId, offset};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;

/// Keeps admitted events at least `ttl` apart, measured on event timestamps
/// so backlogs replay the same way they happened. A zero `ttl` disables
/// the filter.
pub struct WithDebounce<H> {
    inner: H,
    ttl: Duration,
    last: Mutex<Option<DateTime<Utc>>>,
}

impl<H> WithDebounce<H> {
    pub fn new(ttl: Duration, inner: H) -> Self {
        Self {
            inner,
            ttl,
            last: Mutex::new(None),
        }
    }

    fn admit(&self, time: DateTime<Utc>) -> bool {
        let mut last = self.last.lock();
        if let Some(previous) = *last {
            if time < offset(previous, self.ttl) {
                return false;
            }
        }
        *last = Some(time);
        true
    }
}

#[async_trait]
impl<H: EventHandler> EventHandler for WithDebounce<H> {
    fn id(&self) -> HandlerId {
        self.inner.id()
    }

    async fn call(&self, event: &Event) -> Result<(), HandlerError> {
        if !self.ttl.is_zero() && !self.admit(event.time()) {
            return Err(HandlerError::Ignored);
        }
        self.inner.call(event).await
    }

    fn expired(&self) -> bool {
        self.inner.expired()
    }

    fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }
}
