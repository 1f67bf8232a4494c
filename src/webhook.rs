use crate::config::ListenerConfig;
use crate::error::{ConfigError, HandlerError};
use crate::event::Event;
use crate::listener::{EventHandler, from_fn};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Persisted delivery target: where to send events and which filters gate them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub method: String,
    pub url: String,
    #[serde(default, rename = "header", skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(flatten)]
    pub filters: ListenerConfig,
}

impl Webhook {
    /// Builds the delivery handler wrapped in the configured filters.
    pub fn handler(&self) -> Result<Arc<dyn EventHandler>, ConfigError> {
        let delivery = Arc::new(Delivery::new(self)?);
        let terminal = from_fn(move |event: Event| {
            let delivery = delivery.clone();
            async move { delivery.send(&event).await }
        });
        Ok(self.filters.wrap(terminal))
    }
}

/// Two webhooks are the same target when method and URL match.
impl PartialEq for Webhook {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method && self.url == other.url
    }
}

struct Delivery {
    client: Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    // Query keys already in the URL; they win over event data.
    url_keys: HashSet<String>,
    // One request at a time per webhook.
    serial: Mutex<()>,
}

impl Delivery {
    fn new(hook: &Webhook) -> Result<Self, ConfigError> {
        let method = Method::from_bytes(hook.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ConfigError::InvalidMethod(hook.method.clone()))?;
        let url = Url::parse(&hook.url).map_err(|err| ConfigError::InvalidUrl {
            url: hook.url.clone(),
            reason: err.to_string(),
        })?;

        let mut headers = HeaderMap::new();
        for (name, values) in &hook.headers {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                ConfigError::InvalidHeader {
                    name: name.clone(),
                    reason: err.to_string(),
                }
            })?;
            for value in values {
                let value = HeaderValue::from_str(value).map_err(|err| {
                    ConfigError::InvalidHeader {
                        name: name.clone(),
                        reason: err.to_string(),
                    }
                })?;
                headers.append(header.clone(), value);
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let url_keys = url.query_pairs().map(|(key, _)| key.into_owned()).collect();

        Ok(Self {
            client: Client::new(),
            method,
            url,
            headers,
            url_keys,
            serial: Mutex::new(()),
        })
    }

    async fn send(&self, event: &Event) -> Result<(), HandlerError> {
        let _serial = self.serial.lock().await;

        let request = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        let request = if carries_body(&self.method) {
            request.json(event)
        } else {
            request.query(&query_pairs(event.data(), &self.url_keys))
        };

        let response = request.send().await.map_err(anyhow::Error::from)?;
        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(HandlerError::failed(status));
        }
        debug!(url = %self.url, %status, event_type = event.event_type(), "webhook delivered");
        Ok(())
    }
}

fn carries_body(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

/// Flattens the top level of an object payload into query parameters,
/// leaving out keys in `skip`. Arrays repeat the key; nested values are sent
/// as JSON text.
fn query_pairs(data: &Value, skip: &HashSet<String>) -> Vec<(String, String)> {
    let Value::Object(fields) = data else {
        return Vec::new();
    };
    let mut pairs = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        if skip.contains(key) {
            continue;
        }
        match value {
            Value::Null => {}
            Value::Array(items) => {
                pairs.extend(items.iter().map(|item| (key.clone(), scalar(item))));
            }
            other => pairs.push((key.clone(), scalar(other))),
        }
    }
    pairs
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
