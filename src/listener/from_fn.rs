use crate::error::HandlerError;
use crate::event::Event;
use crate::listener::{EventHandler, HandlerId};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Terminal handler around an async callback.
pub struct FromFn<F> {
    id: HandlerId,
    f: F,
    last_error: Mutex<Option<String>>,
}

impl<F> FromFn<F> {
    #[inline]
    pub fn new(f: F) -> Self {
        Self {
            id: HandlerId::new(),
            f,
            last_error: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FromFn<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    #[inline]
    fn id(&self) -> HandlerId {
        self.id
    }

    async fn call(&self, event: &Event) -> Result<(), HandlerError> {
        let result = (self.f)(event.clone()).await;
        *self.last_error.lock() = result.as_ref().err().map(ToString::to_string);
        match result {
            Err(HandlerError::Ignored) => Ok(()),
            other => other,
        }
    }

    #[inline]
    fn expired(&self) -> bool {
        false
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}

#[inline]
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    FromFn::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn invokes_the_callback_once_per_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = from_fn(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        handler.call(&Event::new("tick", 1)).await.unwrap();
        handler.call(&Event::new("tick", 2)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!handler.expired());
        assert_eq!(handler.last_error(), None);
    }

    #[tokio::test]
    async fn ignored_is_reported_as_success() {
        let handler = from_fn(|_| async { Err(HandlerError::Ignored) });

        assert!(handler.call(&Event::new("tick", 1)).await.is_ok());
        assert_eq!(handler.last_error().as_deref(), Some("ignored"));
    }

    #[tokio::test]
    async fn failures_propagate_and_are_remembered_until_the_next_success() {
        let handler = from_fn(|event: Event| async move {
            match event.value() {
                Some(v) if v < 0.0 => Err(HandlerError::failed("negative reading")),
                _ => Ok(()),
            }
        });

        let err = handler.call(&Event::new("t", -1)).await.unwrap_err();
        assert_eq!(err.to_string(), "negative reading");
        assert_eq!(handler.last_error().as_deref(), Some("negative reading"));

        handler.call(&Event::new("t", 1)).await.unwrap();
        assert_eq!(handler.last_error(), None);
    }

    #[test]
    fn every_handler_gets_its_own_id() {
        let a = from_fn(|_| async { Ok(()) });
        let b = from_fn(|_| async { Ok(()) });
        assert_ne!(a.id(), b.id());
    }
}
