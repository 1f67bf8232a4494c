use crate::error::HandlerError;
use crate::event::Event;
use crate::listener::{EventHandler, HandlerId};
use async_trait::async_trait;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Budget {
    spent: usize,
    reserved: usize,
}

/// Lets at most `times` calls through, then expires.
///
/// A slot is reserved before the inner handler runs and is only spent once
/// the inner handler returns anything but `Ignored`. While every remaining
/// slot is reserved by a running call, further events are ignored rather
/// than expiring the handler. `times == 0` disables the limit.
pub struct WithTimes<H> {
    inner: H,
    budget: Mutex<Budget>,
    times: usize,
}

impl<H> WithTimes<H> {
    pub fn new(times: usize, inner: H) -> Self {
        Self {
            inner,
            budget: Mutex::default(),
            times,
        }
    }

    fn exhausted(&self) -> bool {
        self.times > 0 && self.budget.lock().spent >= self.times
    }

    fn reserve(&self) -> Result<Slot<'_>, HandlerError> {
        let mut budget = self.budget.lock();
        if budget.spent >= self.times {
            return Err(HandlerError::Expired);
        }
        if budget.spent + budget.reserved >= self.times {
            return Err(HandlerError::Ignored);
        }
        budget.reserved += 1;
        Ok(Slot {
            budget: &self.budget,
            spend: false,
        })
    }
}

// Released on drop so a panicking or cancelled call gives its slot back.
struct Slot<'a> {
    budget: &'a Mutex<Budget>,
    spend: bool,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let mut budget = self.budget.lock();
        budget.reserved -= 1;
        if self.spend {
            budget.spent += 1;
        }
    }
}

#[async_trait]
impl<H: EventHandler> EventHandler for WithTimes<H> {
    fn id(&self) -> HandlerId {
        self.inner.id()
    }

    async fn call(&self, event: &Event) -> Result<(), HandlerError> {
        if self.times == 0 {
            return self.inner.call(event).await;
        }
        let mut slot = self.reserve()?;
        let result = self.inner.call(event).await;
        slot.spend = !matches!(result, Err(HandlerError::Ignored));
        drop(slot);
        result
    }

    fn expired(&self) -> bool {
        self.exhausted() || self.inner.expired()
    }

    fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }
}
