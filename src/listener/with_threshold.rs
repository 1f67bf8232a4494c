use crate::error::HandlerError;
use crate::event::Event;
use crate::listener::{Direction, EventHandler, HandlerId, reading};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Schmitt trigger over value events.
///
/// Admits the one event that crosses `trigger` in `direction` and then stays
/// latched until a value crosses back past `reset`. Directions other than
/// increasing or decreasing never trigger.
pub struct WithThreshold<H> {
    inner: H,
    direction: Direction,
    trigger: f64,
    reset: f64,
    latched: Mutex<bool>,
}

impl<H> WithThreshold<H> {
    pub fn new(direction: Direction, trigger: f64, reset: f64, inner: H) -> Self {
        Self {
            inner,
            direction,
            trigger,
            reset,
            latched: Mutex::new(false),
        }
    }

    fn admit(&self, value: f64) -> bool {
        let mut latched = self.latched.lock();
        if *latched {
            *latched = match self.direction {
                Direction::Decreasing => value < self.reset,
                Direction::Increasing => value > self.reset,
                _ => true,
            };
            return false;
        }

        *latched = match self.direction {
            Direction::Decreasing => value <= self.trigger,
            Direction::Increasing => value >= self.trigger,
            _ => false,
        };
        *latched
    }
}

#[async_trait]
impl<H: EventHandler> EventHandler for WithThreshold<H> {
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
