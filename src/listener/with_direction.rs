use crate::error::HandlerError;
use crate::event::Event;
use crate::listener::{EventHandler, HandlerId, reading};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increasing,
    Decreasing,
    Steady,
    /// Any change of direction.
    Reverse,
}

#[derive(Debug, Default)]
struct Trend {
    last_value: Option<f64>,
    last_direction: Option<Direction>,
}

/// Admits value events whose movement relative to the previous value
/// matches `target`.
///
/// The first value only sets the baseline. For [`Direction::Reverse`] the
/// first movement after the baseline sets the reference direction and every
/// later movement the other way is admitted.
pub struct WithDirection<H> {
    inner: H,
    target: Direction,
    trend: Mutex<Trend>,
}

impl<H> WithDirection<H> {
    pub fn new(target: Direction, inner: H) -> Self {
        Self {
            inner,
            target,
            trend: Mutex::default(),
        }
    }

    fn admit(&self, value: f64) -> bool {
        let mut trend = self.trend.lock();
        let Some(last) = trend.last_value.replace(value) else {
            return false;
        };

        let direction = if value < last {
            Direction::Decreasing
        } else if value > last {
            Direction::Increasing
        } else {
            return self.target == Direction::Steady;
        };

        let previous = trend.last_direction.replace(direction);
        match self.target {
            Direction::Reverse => previous.is_some_and(|previous| previous != direction),
            target => direction == target,
        }
    }
}

#[async_trait]
impl<H: EventHandler> EventHandler for WithDirection<H> {
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
