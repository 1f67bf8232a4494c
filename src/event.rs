use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt::Display;
use tracing::warn;

/// Fired by the bus after a listener is registered.
pub const LISTENER_ADDED: &str = "listener-add";
/// Fired by the bus after a listener is removed, explicitly or by expiry.
pub const LISTENER_REMOVED: &str = "listener-remove";
/// Fired by the bus when a listener reports a failure.
pub const LISTENER_ERROR: &str = "listener-error";

/// Payloads that expose a numeric reading.
pub trait Valuer {
    fn value(&self) -> f64;
}

/// The specialization chosen for an event when it was constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Plain,
    Value(f64),
    Message(String),
}

/// What a producer hands to [`Event::new`].
///
/// Numbers and strings convert directly. Typed payloads go through
/// [`Payload::valuer`] or [`Payload::display`] so the capability decides the
/// specialization while the serialized object is kept as data.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Number(f64),
    Text(String),
    Valued { value: f64, data: Value },
    Described { message: String, data: Value },
    Json(Value),
}

impl Payload {
    pub fn valuer<T: Valuer + Serialize + ?Sized>(payload: &T) -> Self {
        Self::Valued {
            value: payload.value(),
            data: to_data(payload),
        }
    }

    pub fn display<T: Display + Serialize + ?Sized>(payload: &T) -> Self {
        Self::Described {
            message: payload.to_string(),
            data: to_data(payload),
        }
    }

    fn specialize(self) -> (Value, Kind) {
        match self {
            Payload::Number(value) => (Value::Null, Kind::Value(value)),
            Payload::Text(message) => (Value::Null, Kind::Message(message)),
            Payload::Valued { value, data } => (data, Kind::Value(value)),
            Payload::Described { message, data } => (data, Kind::Message(message)),
            Payload::Json(Value::Number(n)) => {
                (Value::Null, Kind::Value(n.as_f64().unwrap_or(f64::NAN)))
            }
            Payload::Json(Value::String(message)) => (Value::Null, Kind::Message(message)),
            Payload::Json(Value::Object(fields)) => {
                let kind = kind_of_fields(&fields);
                (Value::Object(fields), kind)
            }
            Payload::Json(other) => (other, Kind::Plain),
        }
    }
}

// The specialization still applies when the payload cannot be serialized.
fn to_data<T: Serialize + ?Sized>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or_else(|err| {
        warn!(error = %err, "event payload could not be serialized, keeping no data");
        Value::Null
    })
}

// `value` wins over `message` when both are usable.
fn kind_of_fields(fields: &Map<String, Value>) -> Kind {
    match fields.get("value") {
        Some(Value::Number(n)) => return Kind::Value(n.as_f64().unwrap_or(f64::NAN)),
        Some(Value::String(s)) => return Kind::Message(s.clone()),
        _ => {}
    }
    match fields.get("message") {
        Some(Value::String(s)) => Kind::Message(s.clone()),
        _ => Kind::Plain,
    }
}

macro_rules! numeric_payload {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Payload {
                fn from(value: $t) -> Self {
                    Payload::Number(value as f64)
                }
            }
        )*
    };
}

numeric_payload!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_owned())
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Json(Value::Bool(value))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(value: Map<String, Value>) -> Self {
        Payload::Json(Value::Object(value))
    }
}

/// An immutable record of something that happened.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_type: String,
    time: DateTime<Utc>,
    data: Value,
    kind: Kind,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: impl Into<Payload>) -> Self {
        Self::at(event_type, Utc::now(), data)
    }

    /// Builds an event with an explicit timestamp, for replayed or backlogged readings.
    pub fn at(
        event_type: impl Into<String>,
        time: DateTime<Utc>,
        data: impl Into<Payload>,
    ) -> Self {
        let (data, kind) = data.into().specialize();
        Self {
            event_type: event_type.into(),
            time,
            data,
            kind,
        }
    }

    /// Returns a copy under `event_type`, keeping time, data and specialization.
    pub fn as_type(&self, event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..self.clone()
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn value(&self) -> Option<f64> {
        match self.kind {
            Kind::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match &self.kind {
            Kind::Message(message) => Some(message),
            _ => None,
        }
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Event", 4)?;
        state.serialize_field("type", &self.event_type)?;
        state.serialize_field("time", &self.time)?;
        if self.data.is_null() {
            state.skip_field("data")?;
        } else {
            state.serialize_field("data", &self.data)?;
        }
        match &self.kind {
            Kind::Plain => {}
            Kind::Value(value) => state.serialize_field("value", value)?,
            Kind::Message(message) => state.serialize_field("message", message)?,
        }
        state.end()
    }
}
