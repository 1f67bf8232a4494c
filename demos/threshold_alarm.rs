//! Derived conditions over a raw reading stream.
//!
//! A tank level sensor emits raw readings. Two listeners subscribe to
//! conditions instead of readings:
//! 1. A low-level alarm that fires once per dip below 10 and re-arms above 15.
//! 2. A trend watcher that reports every reversal, at most once per 50ms.
//!
//! Run with `RUST_LOG=evsink=debug` to see registry activity.
use evsink::{
    Bus, Direction, Emit, Event, EventSink, HandlerError, HandlerExt, LISTENER_ERROR,
    ListenerMeta, from_fn,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bus = Bus::new(Duration::from_secs(60));

    let alarm = from_fn(|event: Event| async move {
        println!("[alarm] level low: {:?}", event.value());
        Ok(())
    })
    .with_threshold(Direction::Decreasing, 10.0, 15.0);
    bus.add_listener("tank-level", alarm.shared());

    let trend = from_fn(|event: Event| async move {
        match event.value() {
            Some(level) if level < 0.0 => Err(HandlerError::failed("sensor out of range")),
            level => {
                println!("[trend] reversed at {level:?}");
                Ok(())
            }
        }
    })
    .with_direction(Direction::Reverse)
    .with_debounce(Duration::from_millis(50));
    bus.add_listener("tank-level", trend.shared());

    bus.add_listener(
        LISTENER_ERROR,
        from_fn(|event: Event| async move {
            if let Some(meta) = ListenerMeta::from_event(&event) {
                println!("[errors] {} failed: {:?}", meta.handler_id, meta.error);
            }
            Ok(())
        })
        .shared(),
    );

    for level in [20.0, 18.0, 12.0, 9.0, 8.0, 16.0, 7.0, 11.0, -1.0] {
        bus.emit("tank-level", level);
        bus.drain().await;
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    println!("{} events logged", bus.log().len());
}
