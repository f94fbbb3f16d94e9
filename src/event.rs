//! AMI event type and observer dispatch control.

use crate::error::{AmiError, AmiResult};
use crate::headers::AmiHeader;
use crate::protocol::{AmiMessage, Headers};

/// Returned by observers to control dispatch of the current event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchControl {
    /// Keep invoking the remaining observers for this event.
    Continue,
    /// The event is handled; skip the remaining observers for this event
    /// only. Later events dispatch normally.
    Stop,
}

/// An asynchronous notification from the server.
///
/// Wraps the underlying [`AmiMessage`] and exposes the event name (the
/// `Event` header) plus the optional `ActionID` correlating the event back
/// to the action that triggered it. The correlation identifier is never used
/// for response matching, only offered to observers that want it.
#[derive(Debug, Clone, PartialEq)]
pub struct AmiEvent {
    name: String,
    action_id: Option<String>,
    message: AmiMessage,
}

impl AmiEvent {
    /// Build an event from a message. Fails with [`AmiError::NotAnEvent`]
    /// if the message lacks an `Event` header.
    pub fn from_message(message: AmiMessage) -> AmiResult<Self> {
        let name = message
            .header(AmiHeader::Event)
            .ok_or(AmiError::NotAnEvent)?
            .to_string();
        let action_id = message.header(AmiHeader::ActionId).map(|s| s.to_string());
        Ok(Self {
            name,
            action_id,
            message,
        })
    }

    /// Event name, e.g. `Newchannel`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `ActionID` of the action this event follows up on, if any.
    pub fn action_id(&self) -> Option<&str> {
        self.action_id.as_deref()
    }

    /// First value of the named header.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.message.header(name)
    }

    /// All headers of the underlying message.
    pub fn headers(&self) -> &Headers {
        self.message.headers()
    }

    /// Free-text body, if the event carried one.
    pub fn body(&self) -> Option<&str> {
        self.message.body()
    }

    /// The underlying message.
    pub fn message(&self) -> &AmiMessage {
        &self.message
    }
}
