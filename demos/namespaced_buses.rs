//! Several logical buses over one sink.
//!
//! Each site gets its own namespace; a single audit listener on the shared
//! bus still sees everything through the `listener-add` meta-events.
use evsink::{
    Bus, BusConfig, Emit, Event, EventSink, HandlerExt, LISTENER_ADDED, ListenerConfig,
    Namespaced, from_fn,
};
use serde_json::json;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    let bus = Bus::with_config(&BusConfig::default());
    bus.add_listener(
        LISTENER_ADDED,
        from_fn(|event: Event| async move {
            println!("[audit] {}", event.data());
            Ok(())
        })
        .shared(),
    );

    let north = Namespaced::new("north", bus.clone());
    let south = Namespaced::new("south", bus.clone());

    let config: ListenerConfig = serde_json::from_value(json!({
        "min": 30.0,
        "max": 10.0,
        "max_calls": 2,
    }))
    .expect("valid listener config");

    for (name, site) in [("north", &north), ("south", &south)] {
        let handler = from_fn(move |event: Event| async move {
            println!("[{name}] out of band: {:?}", event.value());
            Ok(())
        });
        site.add_listener("temp", config.wrap(handler));
    }

    north.emit("temp", 35);
    south.emit("temp", 20);
    south.emit("temp", 5);
    bus.drain().await;

    let names: Vec<_> = north.log().iter().map(|e| e.event_type().to_owned()).collect();
    println!("north sees {names:?}");
    println!("shared catalog: {}", bus.list_event_types().len());
}
