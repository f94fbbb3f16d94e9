//! Action serialization and response handling

use crate::constants::LINE_TERMINATOR;
use crate::error::{AmiError, AmiResult};
use crate::headers::AmiHeader;
use crate::protocol::{AmiMessage, Headers};

/// Validate that a user-provided string contains no newline characters.
///
/// Actions are line-delimited; embedded newlines would allow injection of
/// arbitrary headers or whole actions into the stream.
fn validate_no_newlines(s: &str, context: &str) -> AmiResult<()> {
    if s.contains('\n') || s.contains('\r') {
        return Err(AmiError::InvalidHeader {
            header: format!("{} must not contain newlines: {:?}", context, s),
        });
    }
    Ok(())
}

/// Builder for an outbound AMI action.
///
/// Headers are kept in insertion order and may repeat (`Variable:` in
/// `Originate` is the usual case). The `Action` and `ActionID` headers are
/// written by [`to_wire_format`](Self::to_wire_format); adding them manually
/// is not needed.
///
/// ```
/// use asterisk_ami_tokio::AmiAction;
///
/// let action = AmiAction::new("Redirect")
///     .header("Channel", "SIP/101-1").unwrap()
///     .header("Exten", "600").unwrap();
/// let wire = action.to_wire_format("ami-1-00000001").unwrap();
/// assert!(wire.starts_with("Action: Redirect\r\n"));
/// assert!(wire.ends_with("\r\n\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct AmiAction {
    name: String,
    headers: Vec<(String, String)>,
}

impl AmiAction {
    /// Start building the named action.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            headers: Vec::new(),
        }
    }

    /// Action name, e.g. `Login`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a header. Repeated names are sent as repeated lines.
    ///
    /// Returns an error if the name or value contains newline characters.
    pub fn header(mut self, name: impl AsRef<str>, value: &str) -> AmiResult<Self> {
        let name = name.as_ref();
        validate_no_newlines(name, "header name")?;
        validate_no_newlines(value, "header value")?;
        self.headers.push((name.to_string(), value.to_string()));
        Ok(self)
    }

    /// Append a header only when a value is present.
    pub fn opt_header(self, name: impl AsRef<str>, value: Option<&str>) -> AmiResult<Self> {
        match value {
            Some(v) => self.header(name, v),
            None => Ok(self),
        }
    }

    /// Serialize to the wire: `Action` line, `ActionID`, the remaining
    /// headers in insertion order, and the blank-line terminator.
    pub fn to_wire_format(&self, action_id: &str) -> AmiResult<String> {
        use std::fmt::Write;

        validate_no_newlines(&self.name, "action name")?;

        let mut out = String::new();
        let _ = write!(
            out,
            "{}: {}{}",
            AmiHeader::Action.as_str(),
            self.name,
            LINE_TERMINATOR
        );
        let _ = write!(
            out,
            "{}: {}{}",
            AmiHeader::ActionId.as_str(),
            action_id,
            LINE_TERMINATOR
        );
        for (name, value) in &self.headers {
            let _ = write!(out, "{}: {}{}", name, value, LINE_TERMINATOR);
        }
        out.push_str(LINE_TERMINATOR);
        Ok(out)
    }
}

/// Reply to an action.
///
/// AMI signals failure with `Response: Error`; anything else (`Success`,
/// `Follows`, the synthetic placeholder) counts as non-error. The client does
/// not interpret action semantics beyond that split.
#[derive(Debug, Clone, PartialEq)]
pub struct AmiResponse {
    message: AmiMessage,
}

impl AmiResponse {
    pub(crate) fn new(message: AmiMessage) -> Self {
        Self { message }
    }

    /// `true` unless the `Response` header is `Error`.
    pub fn is_success(&self) -> bool {
        !self.is_error()
    }

    /// `true` if the `Response` header is `Error`.
    pub fn is_error(&self) -> bool {
        matches!(self.message.header(AmiHeader::Response), Some("Error"))
    }

    /// Raw `Response` header value (`Success`, `Error`, `Follows`, …).
    pub fn response(&self) -> Option<&str> {
        self.message.header(AmiHeader::Response)
    }

    /// The server's `Message` header, when present.
    pub fn text(&self) -> Option<&str> {
        self.message.header(AmiHeader::Message)
    }

    /// First value of the named header.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.message.header(name)
    }

    /// All response headers.
    pub fn headers(&self) -> &Headers {
        self.message.headers()
    }

    /// Free-text body (e.g. `Command` output), if any.
    pub fn body(&self) -> Option<&str> {
        self.message.body()
    }

    /// The underlying message.
    pub fn message(&self) -> &AmiMessage {
        &self.message
    }
}
