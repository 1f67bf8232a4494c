use thiserror::Error;

/// Outcome of a handler invocation that did not succeed.
///
/// Only `Failed` and `IncompatibleEvent` are surfaced to observers; the bus
/// treats `Ignored` as silence and `Expired` as a request to retire the
/// listener.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The event was not admitted this time.
    #[error("ignored")]
    Ignored,

    /// The handler is permanently done and should be removed.
    #[error("expired")]
    Expired,

    /// A filter received an event shape it cannot evaluate.
    #[error("incompatible event")]
    IncompatibleEvent,

    /// Anything the terminal callback reports.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed(anyhow::anyhow!("{message}"))
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid http method `{0}`")]
    InvalidMethod(String),

    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },
}
