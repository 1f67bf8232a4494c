use crate::error::HandlerError;
use crate::event::Event;
use crate::listener::{EventHandler, HandlerId, offset};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Expires `ttl` after construction. Events stamped later than the deadline
/// are refused even if they arrive early. A zero `ttl` disables the filter.
pub struct WithTimeout<H> {
    inner: H,
    deadline: Option<DateTime<Utc>>,
}

impl<H> WithTimeout<H> {
    pub fn new(ttl: Duration, inner: H) -> Self {
        let deadline = (!ttl.is_zero()).then(|| offset(Utc::now(), ttl));
        Self { inner, deadline }
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }
}

#[async_trait]
impl<H: EventHandler> EventHandler for WithTimeout<H> {
    fn id(&self) -> HandlerId {
        self.inner.id()
    }

    async fn call(&self, event: &Event) -> Result<(), HandlerError> {
        if self.deadline.is_some_and(|deadline| event.time() > deadline) {
            return Err(HandlerError::Expired);
        }
        self.inner.call(event).await
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Utc::now() > deadline) || self.inner.expired()
    }

    fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }
}
