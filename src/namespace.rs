use crate::emit::EventSink;
use crate::event::Event;
use crate::listener::{EventHandler, HandlerId};
use std::sync::Arc;

/// A view over another sink with its own event-type namespace.
///
/// Writes go to the underlying sink as `"{prefix}-{event_type}"`; reads only
/// see entries under the prefix, with the prefix stripped. Views over one
/// sink share its log, registry and lock.
#[derive(Debug, Clone)]
pub struct Namespaced<S> {
    prefix: String,
    sink: S,
}

impl<S: EventSink> Namespaced<S> {
    pub fn new(prefix: impl AsRef<str>, sink: S) -> Self {
        Self {
            prefix: format!("{}-", prefix.as_ref()),
            sink,
        }
    }

    /// Full prefix, separator included.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn qualify(&self, event_type: &str) -> String {
        format!("{}{event_type}", self.prefix)
    }

    fn strip(&self, events: Vec<Event>) -> Vec<Event> {
        events
            .into_iter()
            .filter_map(|event| {
                let local = event.event_type().strip_prefix(&self.prefix)?;
                Some(event.as_type(local))
            })
            .collect()
    }
}

impl<S: EventSink> EventSink for Namespaced<S> {
    fn add_listener(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> HandlerId {
        self.sink.add_listener(&self.qualify(event_type), handler)
    }

    fn remove_listener(&self, event_type: &str, handler: &dyn EventHandler) {
        self.sink.remove_listener(&self.qualify(event_type), handler)
    }

    fn once(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> HandlerId {
        self.sink.once(&self.qualify(event_type), handler)
    }

    fn fire(&self, event: Event) {
        let event = event.as_type(self.qualify(event.event_type()));
        self.sink.fire(event)
    }

    fn log(&self) -> Vec<Event> {
        self.strip(self.sink.log())
    }

    fn register_event_type(&self, event: Event) {
        let event = event.as_type(self.qualify(event.event_type()));
        self.sink.register_event_type(event)
    }

    fn list_event_types(&self) -> Vec<Event> {
        self.strip(self.sink.list_event_types())
    }
}
