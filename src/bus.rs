use crate::config::BusConfig;
use crate::emit::{Emit, EventSink};
use crate::error::HandlerError;
use crate::event::{Event, LISTENER_ADDED, LISTENER_ERROR, LISTENER_REMOVED, Payload};
use crate::in_flight::InFlight;
use crate::listener::{EventHandler, HandlerId};
use crate::log::EventLog;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Payload of the `listener-*` meta-events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerMeta {
    pub event_type: String,
    pub handler_id: HandlerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ListenerMeta {
    fn new(event_type: &str, handler_id: HandlerId) -> Self {
        Self {
            event_type: event_type.to_owned(),
            handler_id,
            error: None,
        }
    }

    /// Reads the meta payload back out of a `listener-*` event.
    pub fn from_event(event: &Event) -> Option<Self> {
        serde_json::from_value(event.data().clone()).ok()
    }
}

impl From<ListenerMeta> for Payload {
    fn from(meta: ListenerMeta) -> Self {
        Payload::Json(serde_json::to_value(meta).unwrap_or_default())
    }
}

#[derive(Default)]
struct Registry {
    listeners: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    event_types: HashMap<String, Event>,
}

struct Inner {
    registry: Mutex<Registry>,
    log: EventLog,
    in_flight: InFlight,
}

/// In-process event bus.
///
/// Every listener of a fired event runs in its own Tokio task, so `Bus` must
/// be used from within a Tokio runtime. The registry lock is never held
/// while a listener runs or a meta-event is emitted.
///
/// Outcomes of a listener call:
/// 1. `Expired` removes the listener and is not reported.
/// 2. `Ignored` is dropped silently.
/// 3. Any other error is emitted as a [`LISTENER_ERROR`] event.
/// 4. Regardless of the result, a listener that now reports itself expired is removed.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<Inner>,
}

impl Bus {
    pub fn new(log_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::default(),
                log: EventLog::new(log_ttl),
                in_flight: InFlight::default(),
            }),
        }
    }

    pub fn with_config(config: &BusConfig) -> Self {
        Self::new(config.log_ttl())
    }

    /// Waits until every listener call and meta-event spawned by this bus,
    /// including those spawned while waiting, has finished.
    pub async fn drain(&self) {
        self.inner.in_flight.settled().await;
    }

    /// Number of spawned tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.pending()
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner
            .registry
            .lock()
            .listeners
            .get(event_type)
            .map_or(0, Vec::len)
    }

    fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) {
        let guard = self.inner.in_flight.track();
        tokio::spawn(async move {
            task.await;
            drop(guard);
        });
    }

    fn emit_later(&self, event_type: &'static str, meta: ListenerMeta) {
        let bus = self.clone();
        self.spawn(async move { bus.emit(event_type, meta) });
    }

    fn dispatch(&self, event: Arc<Event>, handler: Arc<dyn EventHandler>) {
        let bus = self.clone();
        self.spawn(async move {
            let event_type = event.event_type();
            let outcome = AssertUnwindSafe(handler.call(&event))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(HandlerError::failed(panic_message(&*panic))));

            match outcome {
                Ok(()) | Err(HandlerError::Ignored) => {}
                Err(HandlerError::Expired) => {
                    debug!(event_type, handler_id = %handler.id(), "listener expired");
                    bus.remove_listener(event_type, &*handler);
                    return;
                }
                Err(err) => {
                    warn!(event_type, handler_id = %handler.id(), error = %err, "listener failed");
                    let mut meta = ListenerMeta::new(event_type, handler.id());
                    meta.error = Some(err.to_string());
                    bus.emit(LISTENER_ERROR, meta);
                }
            }

            if handler.expired() {
                debug!(event_type, handler_id = %handler.id(), "listener expired");
                bus.remove_listener(event_type, &*handler);
            }
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("listener panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("listener panicked: {message}")
    } else {
        "listener panicked".to_owned()
    }
}

impl EventSink for Bus {
    fn add_listener(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> HandlerId {
        let id = handler.id();
        self.inner
            .registry
            .lock()
            .listeners
            .entry(event_type.to_owned())
            .or_default()
            .push(handler);

        debug!(event_type, handler_id = %id, "listener added");
        self.emit_later(LISTENER_ADDED, ListenerMeta::new(event_type, id));
        id
    }

    fn remove_listener(&self, event_type: &str, handler: &dyn EventHandler) {
        let id = handler.id();
        let removed = {
            let mut registry = self.inner.registry.lock();
            let Some(listeners) = registry.listeners.get_mut(event_type) else {
                return;
            };
            let before = listeners.len();
            listeners.retain(|listener| listener.id() != id);
            let removed = before - listeners.len();
            if listeners.is_empty() {
                registry.listeners.remove(event_type);
            }
            removed
        };

        for _ in 0..removed {
            debug!(event_type, handler_id = %id, "listener removed");
            self.emit_later(LISTENER_REMOVED, ListenerMeta::new(event_type, id));
        }
    }

    fn fire(&self, event: Event) {
        self.inner.log.record(event.clone());

        let listeners = {
            let mut registry = self.inner.registry.lock();
            if !registry.event_types.contains_key(event.event_type()) {
                registry
                    .event_types
                    .insert(event.event_type().to_owned(), event.clone());
            }
            registry
                .listeners
                .get(event.event_type())
                .cloned()
                .unwrap_or_default()
        };

        trace!(event_type = event.event_type(), listeners = listeners.len(), "fire");
        let event = Arc::new(event);
        for handler in listeners {
            self.dispatch(event.clone(), handler);
        }
    }

    fn log(&self) -> Vec<Event> {
        self.inner.log.snapshot()
    }

    fn register_event_type(&self, event: Event) {
        self.inner
            .registry
            .lock()
            .event_types
            .insert(event.event_type().to_owned(), event);
    }

    fn list_event_types(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .inner
            .registry
            .lock()
            .event_types
            .values()
            .cloned()
            .collect();
        events.sort_by(|a, b| a.event_type().cmp(b.event_type()));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{HandlerExt, HandlerRef, from_fn};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    fn bus() -> Bus {
        Bus::new(Duration::from_secs(60))
    }

    fn counter() -> (Arc<dyn EventHandler>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let clone = count.clone();
        let handler = from_fn(move |_| {
            let count = clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        (handler.shared(), count)
    }

    /// Forwards every event of `event_type` into a channel.
    fn watch(bus: &Bus, event_type: &str) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        bus.add_listener(
            event_type,
            from_fn(move |event| {
                let _ = tx.send(event);
                async { Ok(()) }
            })
            .shared(),
        );
        rx
    }

    fn drain_channel(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn fired_events_reach_listeners_of_their_type_only() {
        let bus = bus();
        let (temp, temp_calls) = counter();
        let (door, door_calls) = counter();
        bus.add_listener("temp", temp);
        bus.add_listener("door", door);

        bus.emit("temp", 21.5);
        bus.emit("temp", 22.0);
        bus.emit("door", "open");
        bus.drain().await;

        assert_eq!(temp_calls.load(Ordering::SeqCst), 2);
        assert_eq!(door_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn removed_listeners_are_not_called_again() {
        let bus = bus();
        let (handler, calls) = counter();
        bus.add_listener("temp", handler.clone());

        bus.emit("temp", 1);
        bus.drain().await;
        bus.remove_listener("temp", &handler);
        bus.emit("temp", 2);
        bus.drain().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("temp"), 0);
    }

    #[tokio::test]
    async fn listeners_can_be_removed_by_reference() {
        let bus = bus();
        let (handler, calls) = counter();
        let id = bus.add_listener("temp", handler);

        bus.remove_listener("temp", &HandlerRef::new(id));
        bus.emit("temp", 1);
        bus.drain().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn once_fires_a_single_time_and_retires() {
        let bus = bus();
        let (handler, calls) = counter();
        bus.once("temp", handler);

        bus.emit("temp", 1);
        bus.drain().await;
        bus.emit("temp", 2);
        bus.drain().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("temp"), 0);
    }

    #[tokio::test]
    async fn once_holds_while_the_first_call_is_still_running() {
        let bus = bus();
        let calls = Arc::new(AtomicUsize::new(0));
        let clone = calls.clone();
        bus.once(
            "temp",
            from_fn(move |_| {
                let calls = clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(())
                }
            })
            .shared(),
        );

        bus.emit("temp", 1);
        bus.emit("temp", 2);
        bus.drain().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("temp"), 0);
    }

    #[tokio::test]
    async fn add_and_remove_emit_meta_events() {
        let bus = bus();
        let mut added = watch(&bus, LISTENER_ADDED);
        let mut removed = watch(&bus, LISTENER_REMOVED);
        bus.drain().await;
        drain_channel(&mut added);

        let (handler, _) = counter();
        let id = bus.add_listener("temp", handler.clone());
        bus.drain().await;
        bus.remove_listener("temp", &handler);
        bus.drain().await;

        let added = drain_channel(&mut added);
        assert_eq!(added.len(), 1);
        assert_eq!(
            ListenerMeta::from_event(&added[0]),
            Some(ListenerMeta::new("temp", id))
        );
        assert_eq!(added[0].data(), &json!({"event_type": "temp", "handler_id": id}));

        let removed = drain_channel(&mut removed);
        assert_eq!(removed.len(), 1);
        assert_eq!(ListenerMeta::from_event(&removed[0]).unwrap().handler_id, id);
    }

    #[tokio::test]
    async fn removing_an_unknown_listener_emits_nothing() {
        let bus = bus();
        let mut removed = watch(&bus, LISTENER_REMOVED);

        bus.remove_listener("temp", &HandlerRef::new(HandlerId::new()));
        bus.drain().await;

        assert!(drain_channel(&mut removed).is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn registrations_are_logged() {
        let bus = bus();
        let (handler, _) = counter();
        bus.add_listener("temp", handler.clone());
        bus.remove_listener("temp", &handler);

        assert!(logs_contain("listener added"));
        assert!(logs_contain("listener removed"));
    }

    #[tokio::test]
    async fn failures_are_reported_as_listener_errors() {
        let bus = bus();
        let mut errors = watch(&bus, LISTENER_ERROR);
        let failing = from_fn(|_| async { Err(HandlerError::failed("503 Service Unavailable")) });
        let id = bus.add_listener("temp", failing.shared());

        bus.emit("temp", 1);
        bus.drain().await;

        let errors = drain_channel(&mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            ListenerMeta::from_event(&errors[0]),
            Some(ListenerMeta {
                event_type: "temp".into(),
                handler_id: id,
                error: Some("503 Service Unavailable".into()),
            })
        );
        assert_eq!(bus.listener_count("temp"), 1);
    }

    #[tokio::test]
    async fn incompatible_events_are_reported() {
        let bus = bus();
        let mut errors = watch(&bus, LISTENER_ERROR);
        let (handler, calls) = counter();
        bus.add_listener("temp", handler.with_range(0.0, 10.0).shared());

        bus.emit("temp", "not a reading");
        bus.drain().await;

        let errors = drain_channel(&mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            ListenerMeta::from_event(&errors[0]).unwrap().error.as_deref(),
            Some("incompatible event")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ignored_calls_are_silent() {
        let bus = bus();
        let mut errors = watch(&bus, LISTENER_ERROR);
        let (handler, calls) = counter();
        bus.add_listener("temp", handler.with_range(0.0, 10.0).shared());

        bus.emit("temp", 50);
        bus.emit("temp", f64::NAN);
        bus.drain().await;

        assert!(drain_channel(&mut errors).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count("temp"), 1);
    }

    #[tokio::test]
    async fn panicking_listeners_are_reported_and_others_still_run() {
        let bus = bus();
        let mut errors = watch(&bus, LISTENER_ERROR);
        let (handler, calls) = counter();
        let panicking = from_fn(|event: Event| async move {
            assert!(event.value().is_none(), "boom");
            Ok(())
        });
        bus.add_listener("temp", panicking.shared());
        bus.add_listener("temp", handler);

        bus.emit("temp", 1);
        bus.drain().await;

        let errors = drain_channel(&mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            ListenerMeta::from_event(&errors[0]).unwrap().error.as_deref(),
            Some("listener panicked: boom")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_listeners_are_removed_without_an_error() {
        let bus = bus();
        let mut errors = watch(&bus, LISTENER_ERROR);
        let mut removed = watch(&bus, LISTENER_REMOVED);
        let (handler, calls) = counter();
        bus.add_listener("temp", handler.with_times(2).shared());

        for value in 0..5 {
            bus.emit("temp", value);
            bus.drain().await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(bus.listener_count("temp"), 0);
        assert!(drain_channel(&mut errors).is_empty());
        assert_eq!(drain_channel(&mut removed).len(), 1);
    }

    #[tokio::test]
    async fn fire_does_not_wait_for_listeners() {
        let bus = bus();
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let gate = Arc::new(tokio::sync::Mutex::new(Some(gate)));
        bus.add_listener(
            "slow",
            from_fn(move |_| {
                let gate = gate.clone();
                async move {
                    if let Some(gate) = gate.lock().await.take() {
                        let _ = gate.await;
                    }
                    Ok(())
                }
            })
            .shared(),
        );
        bus.drain().await;

        bus.emit("slow", 1);
        assert_eq!(bus.log()[0].event_type(), "slow", "logged before any listener ran");
        assert!(bus.in_flight() > 0);

        release.send(()).unwrap();
        bus.drain().await;
        assert_eq!(bus.in_flight(), 0);
    }

    #[tokio::test]
    async fn log_is_newest_first_and_pruned_by_age() {
        let bus = Bus::new(Duration::from_millis(100));
        bus.emit("a", 1);
        bus.emit("b", 2);

        let types: Vec<_> = bus.log().iter().map(|e| e.event_type().to_owned()).collect();
        assert_eq!(types, ["b", "a"]);

        tokio::time::sleep(Duration::from_millis(150)).await;
        bus.emit("c", 3);

        let types: Vec<_> = bus.log().iter().map(|e| e.event_type().to_owned()).collect();
        assert_eq!(types, ["c"]);
    }

    #[tokio::test]
    async fn catalog_keeps_the_first_event_unless_registered() {
        let bus = bus();
        bus.emit("temp", 1);
        bus.emit("temp", 2);
        bus.emit("door", "open");

        let types = bus.list_event_types();
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].event_type(), "door");
        assert_eq!(types[1].value(), Some(1.0));

        bus.register_event_type(Event::new("temp", 99));
        bus.register_event_type(Event::new("alarm", "sample"));

        let types = bus.list_event_types();
        let names: Vec<_> = types.iter().map(Event::event_type).collect();
        assert_eq!(names, ["alarm", "door", "temp"]);
        assert_eq!(types[2].value(), Some(99.0));
    }

    #[tokio::test]
    async fn config_sets_the_log_retention() {
        let bus = Bus::with_config(&BusConfig { log_ttl_ms: 10 });
        bus.emit("a", 1);
        tokio::time::sleep(Duration::from_millis(30)).await;
        bus.emit("b", 2);
        assert_eq!(bus.log().len(), 1);
    }
}
