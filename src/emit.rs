use crate::event::{Event, Payload};
use crate::listener::{EventHandler, HandlerId, WithTimes};
use std::sync::Arc;

/// A registry of listeners keyed by event type, plus its log and catalog.
pub trait EventSink: Send + Sync {
    fn add_listener(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> HandlerId;

    /// Removes every listener of `event_type` with the same id as `handler`.
    fn remove_listener(&self, event_type: &str, handler: &dyn EventHandler);

    fn once(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> HandlerId {
        self.add_listener(event_type, Arc::new(WithTimes::new(1, handler)))
    }

    /// Records `event` and dispatches it without waiting for any listener.
    fn fire(&self, event: Event);

    /// Logged events, newest first.
    fn log(&self) -> Vec<Event>;

    fn register_event_type(&self, event: Event);

    /// One sample event per known type, sorted by type.
    fn list_event_types(&self) -> Vec<Event>;
}

pub trait Emit: EventSink {
    fn emit(&self, event_type: &str, data: impl Into<Payload>) {
        self.fire(Event::new(event_type, data));
    }
}

impl<S: EventSink + ?Sized> Emit for S {}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn add_listener(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> HandlerId {
        (**self).add_listener(event_type, handler)
    }

    fn remove_listener(&self, event_type: &str, handler: &dyn EventHandler) {
        (**self).remove_listener(event_type, handler)
    }

    fn once(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> HandlerId {
        (**self).once(event_type, handler)
    }

    fn fire(&self, event: Event) {
        (**self).fire(event)
    }

    fn log(&self) -> Vec<Event> {
        (**self).log()
    }

    fn register_event_type(&self, event: Event) {
        (**self).register_event_type(event)
    }

    fn list_event_types(&self) -> Vec<Event> {
        (**self).list_event_types()
    }
}
