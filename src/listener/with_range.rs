use crate::error::HandlerError;
use crate::event::Event;
use crate::listener::{EventHandler, HandlerId, reading};
use async_trait::async_trait;

/// Admits value events inside `[min, max]`.
///
/// With `min > max` the band is inverted: values outside `(max, min)` are
/// admitted, which expresses an out-of-band alarm with the same filter.
pub struct WithRange<H> {
    inner: H,
    min: f64,
    max: f64,
}

impl<H> WithRange<H> {
    pub fn new(min: f64, max: f64, inner: H) -> Self {
        Self { inner, min, max }
    }

    fn admit(&self, value: f64) -> bool {
        if self.min <= self.max {
            (self.min..=self.max).contains(&value)
        } else {
            value <= self.max || value >= self.min
        }
    }
}

#[async_trait]
impl<H: EventHandler> EventHandler for WithRange<H> {
    fn id(&self) -> HandlerId {
        self.inner.id()
    }

    async fn call(&self, event: &Event) -> Result<(), HandlerError> {
        let value = reading(event)?;
        if !self.admit(value) {
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
