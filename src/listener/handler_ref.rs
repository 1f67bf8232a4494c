use crate::error::HandlerError;
use crate::event::Event;
use crate::listener::{EventHandler, HandlerId};
use async_trait::async_trait;

/// Stand-in carrying only an id, for removing a listener whose callback
/// is no longer at hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerRef(HandlerId);

impl HandlerRef {
    pub fn new(id: HandlerId) -> Self {
        Self(id)
    }
}

#[async_trait]
impl EventHandler for HandlerRef {
    fn id(&self) -> HandlerId {
        self.0
    }

    async fn call(&self, _: &Event) -> Result<(), HandlerError> {
        Err(HandlerError::failed("not a real handler"))
    }

    fn expired(&self) -> bool {
        false
    }

    fn last_error(&self) -> Option<String> {
        None
    }
}
