//! In-process event sink with composable, stateful handler filters.
//!
//! Producers [`Emit`] named events on a [`Bus`]; listeners are
//! [`EventHandler`]s, usually an async callback from [`from_fn`] wrapped in
//! filters such as [`WithThreshold`] or [`WithDebounce`] so they only run
//! on derived conditions. Failures of listeners are published back on the
//! bus as [`LISTENER_ERROR`] events.

mod bus;
mod config;
mod emit;
mod error;
mod event;
mod in_flight;
mod listener;
mod log;
mod namespace;
#[cfg(feature = "webhook")]
mod webhook;

pub use {
    bus::{Bus, ListenerMeta},
    config::{BusConfig, ListenerConfig},
    emit::{Emit, EventSink},
    error::{ConfigError, HandlerError},
    event::*,
    listener::*,
    namespace::Namespaced,
};

#[cfg(feature = "webhook")]
pub use webhook::Webhook;
