//! AMI wire framing and message parsing.
//!
//! The wire protocol is a sequence of `Header: Value` lines terminated by
//! `\r\n`, with an empty line ending each message. The one exception is the
//! greeting sent immediately after connect: a single unstructured
//! `Title/Version` line with no header syntax and no blank-line terminator
//! of its own.

use std::collections::HashMap;

use crate::buffer::AmiBuffer;
use crate::constants::{LINE_TERMINATOR, MAX_FRAME_SIZE, SYNTHETIC_RESPONSE};
use crate::error::{AmiError, AmiResult};
use crate::headers::AmiHeader;

/// Case-sensitive header multimap.
///
/// Most headers are single-valued, but AMI legally repeats some header names
/// (`Variable:` in particular). Repeated values are preserved in arrival
/// order rather than the last value winning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    map: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `name`, preserving any existing values.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map.entry(name.into()).or_default().push(value.into());
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        self.map
            .get(name.as_ref())
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    /// All values for `name`, in arrival order.
    pub fn get_all(&self, name: impl AsRef<str>) -> Option<&[String]> {
        self.map.get(name.as_ref()).map(|v| v.as_slice())
    }

    /// Whether any value exists under `name`.
    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.map.contains_key(name.as_ref())
    }

    /// Whether the map holds no headers at all.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over `(name, values)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Message classification derived from the headers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageKind {
    /// The unstructured `Title/Version` line sent right after connect
    Greeting,
    /// Asynchronous notification, carries an `Event` header
    Event,
    /// Synchronous reply to an action, carries a `Response` header
    Response,
    /// Neither event nor response; logged and dropped by the dispatcher
    Unknown,
}

/// Ordered lines collected between blank-line boundaries.
///
/// Produced by [`AmiParser::next_frame`], consumed immediately by
/// [`AmiMessage::from_frame`]. Never contains a partial message.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// The message's lines, in wire order, without terminators.
    pub lines: Vec<String>,
    /// Set for the single-line greeting frame.
    pub greeting: bool,
}

/// A parsed AMI message, immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AmiMessage {
    kind: MessageKind,
    headers: Headers,
    body: Option<String>,
}

impl AmiMessage {
    /// Parse a frame into a message. Pure and total: malformed lines become
    /// body text, and a frame yielding zero headers receives the synthetic
    /// `Response: Generated Header` so classification always has at least
    /// one header to work with.
    ///
    /// Splitting rule: each line splits on the *first* `:` only (values may
    /// contain colons), with surrounding whitespace stripped from both
    /// fields. Lines with no `:` are body text, preserved in original order
    /// and newline-joined.
    pub fn from_frame(frame: RawFrame) -> Self {
        let mut headers = Headers::new();
        let mut body_lines: Vec<&str> = Vec::new();

        if frame.greeting {
            headers.insert(AmiHeader::Response.as_str(), SYNTHETIC_RESPONSE);
            let line = frame.lines.first().map(|s| s.as_str()).unwrap_or_default();
            return Self {
                kind: MessageKind::Greeting,
                headers,
                body: Some(line.to_string()),
            };
        }

        for line in &frame.lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.insert(name.trim(), value.trim());
                }
                None => body_lines.push(line),
            }
        }

        if headers.is_empty() {
            headers.insert(AmiHeader::Response.as_str(), SYNTHETIC_RESPONSE);
        }

        let kind = if headers.contains(AmiHeader::Event) {
            MessageKind::Event
        } else if headers.contains(AmiHeader::Response) {
            MessageKind::Response
        } else {
            MessageKind::Unknown
        };

        let body = if body_lines.is_empty() {
            None
        } else {
            Some(body_lines.join("\n"))
        };

        Self {
            kind,
            headers,
            body,
        }
    }

    /// Message classification.
    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    /// All headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First value of the named header.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers.get(name)
    }

    /// Free-text body lines, newline-joined, if any were present.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// The greeting line, split into title and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Server title, e.g. `Asterisk Call Manager`.
    pub title: String,
    /// Protocol version, e.g. `1.1`.
    pub version: String,
}

impl Greeting {
    /// Parse a `Title/Version` greeting line. The split is on the last `/`
    /// so titles containing slashes stay intact.
    pub fn parse(line: &str) -> AmiResult<Self> {
        let (title, version) = line
            .rsplit_once('/')
            .ok_or_else(|| AmiError::protocol_error(format!("malformed greeting: {line:?}")))?;
        Ok(Self {
            title: title.trim().to_string(),
            version: version.trim().to_string(),
        })
    }
}

impl std::fmt::Display for Greeting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.title, self.version)
    }
}

/// Incremental frame assembler.
///
/// Raw socket bytes go in via [`add_data`](Self::add_data); complete frames
/// come out of [`next_frame`](Self::next_frame). A frame ends at an empty
/// line. Until the greeting has been seen, a line containing `/` but no `:`
/// is treated as the complete one-line greeting frame. Partial data is held
/// until more bytes arrive; a frame is never emitted incomplete.
#[derive(Debug)]
pub struct AmiParser {
    buffer: AmiBuffer,
    pending: Vec<String>,
    pending_bytes: usize,
    greeting_seen: bool,
}

impl AmiParser {
    /// Create a parser awaiting the greeting.
    pub fn new() -> Self {
        Self {
            buffer: AmiBuffer::new(),
            pending: Vec::new(),
            pending_bytes: 0,
            greeting_seen: false,
        }
    }

    /// Add raw data from the socket.
    pub fn add_data(&mut self, data: &[u8]) -> AmiResult<()> {
        self.buffer.extend_from_slice(data);
        self.buffer.check_size_limits()
    }

    /// Try to assemble the next complete frame from buffered data.
    ///
    /// Returns `Ok(None)` when more data is needed.
    pub fn next_frame(&mut self) -> AmiResult<Option<RawFrame>> {
        loop {
            let Some(raw_line) = self.buffer.extract_until_pattern(LINE_TERMINATOR.as_bytes())
            else {
                self.buffer.compact();
                return Ok(None);
            };

            let line = String::from_utf8(raw_line)
                .map_err(|_| AmiError::protocol_error("invalid UTF-8 on the wire"))?;

            if line.is_empty() {
                if self.pending.is_empty() {
                    // Stray blank line between messages; not a frame.
                    continue;
                }
                self.pending_bytes = 0;
                self.buffer.compact();
                return Ok(Some(RawFrame {
                    lines: std::mem::take(&mut self.pending),
                    greeting: false,
                }));
            }

            // The greeting is the only line on the wire that is not
            // header-formatted and not blank-line terminated.
            if !self.greeting_seen
                && self.pending.is_empty()
                && line.contains('/')
                && !line.contains(':')
            {
                self.greeting_seen = true;
                self.buffer.compact();
                return Ok(Some(RawFrame {
                    lines: vec![line],
                    greeting: true,
                }));
            }

            self.pending_bytes += line.len();
            if self.pending_bytes > MAX_FRAME_SIZE {
                return Err(AmiError::protocol_error(format!(
                    "frame exceeded {} bytes without a terminator",
                    MAX_FRAME_SIZE
                )));
            }
            self.pending.push(line);
        }
    }
}

impl Default for AmiParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(data: &[u8]) -> AmiMessage {
        let mut parser = AmiParser::new();
        parser.add_data(data).unwrap();
        let frame = parser.next_frame().unwrap().unwrap();
        AmiMessage::from_frame(frame)
    }

    #[test]
    fn greeting_is_a_one_line_frame() {
        let mut parser = AmiParser::new();
        parser
            .add_data(b"Asterisk Call Manager/1.1\r\n")
            .unwrap();
        let frame = parser.next_frame().unwrap().unwrap();

        assert!(frame.greeting);
        assert_eq!(frame.lines, vec!["Asterisk Call Manager/1.1"]);

        let message = AmiMessage::from_frame(frame);
        assert_eq!(*message.kind(), MessageKind::Greeting);
        assert_eq!(message.body(), Some("Asterisk Call Manager/1.1"));

        let greeting = Greeting::parse(message.body().unwrap()).unwrap();
        assert_eq!(greeting.title, "Asterisk Call Manager");
        assert_eq!(greeting.version, "1.1");
    }

    #[test]
    fn greeting_rule_only_before_greeting_seen() {
        let mut parser = AmiParser::new();
        parser
            .add_data(b"Asterisk Call Manager/1.1\r\nResponse: Follows\r\nlcr/556 is Up\r\n\r\n")
            .unwrap();

        let greeting = parser.next_frame().unwrap().unwrap();
        assert!(greeting.greeting);

        // "lcr/556 is Up" contains '/' and no ':' but must now be body text,
        // not a second greeting.
        let frame = parser.next_frame().unwrap().unwrap();
        assert!(!frame.greeting);
        let message = AmiMessage::from_frame(frame);
        assert_eq!(*message.kind(), MessageKind::Response);
        assert_eq!(message.body(), Some("lcr/556 is Up"));
    }

    #[test]
    fn response_message_parses() {
        let message = parse_one(b"Response: Success\r\nMessage: Authentication accepted\r\n\r\n");
        assert_eq!(*message.kind(), MessageKind::Response);
        assert_eq!(message.header("Response"), Some("Success"));
        assert_eq!(message.header("Message"), Some("Authentication accepted"));
        assert!(message.body().is_none());
    }

    #[test]
    fn event_message_parses() {
        let message = parse_one(b"Event: Newchannel\r\nChannel: SIP/101-1\r\n\r\n");
        assert_eq!(*message.kind(), MessageKind::Event);
        assert_eq!(message.header("Event"), Some("Newchannel"));
    }

    #[test]
    fn splits_on_first_colon_only() {
        let message = parse_one(b"Response: Success\r\nChannel: Local/101@ctx:1\r\n\r\n");
        assert_eq!(message.header("Channel"), Some("Local/101@ctx:1"));
    }

    #[test]
    fn duplicate_headers_preserved_in_order() {
        let message = parse_one(
            b"Event: AgentCalled\r\nVariable: a=1\r\nVariable: b=2\r\nUniqueid: 1.1\r\n\r\n",
        );
        assert_eq!(
            message.headers().get_all("Variable").unwrap(),
            &["a=1".to_string(), "b=2".to_string()]
        );
        // Single-valued headers keep exactly one value.
        assert_eq!(message.headers().get_all("Uniqueid").unwrap().len(), 1);
    }

    #[test]
    fn headerless_frame_gets_synthetic_header() {
        let message = parse_one(b"no colons here\r\nsecond line\r\n\r\n");
        assert_eq!(message.header("Response"), Some(SYNTHETIC_RESPONSE));
        assert_eq!(message.body(), Some("no colons here\nsecond line"));
        assert_eq!(*message.kind(), MessageKind::Response);
    }

    #[test]
    fn non_header_lines_become_body_in_order() {
        let message = parse_one(
            b"Response: Follows\r\nPrivilege: Command\r\nChannel  Location  State\r\n1 active channel\r\n--END COMMAND--\r\n\r\n",
        );
        assert_eq!(*message.kind(), MessageKind::Response);
        assert_eq!(
            message.body(),
            Some("Channel  Location  State\n1 active channel\n--END COMMAND--")
        );
    }

    #[test]
    fn incomplete_frame_returns_none() {
        let mut parser = AmiParser::new();
        parser.add_data(b"Response: Success\r\n").unwrap();
        assert!(parser.next_frame().unwrap().is_none());

        parser.add_data(b"\r\n").unwrap();
        assert!(parser.next_frame().unwrap().is_some());
    }

    #[test]
    fn frame_split_across_reads() {
        let mut parser = AmiParser::new();
        parser.add_data(b"Event: New").unwrap();
        assert!(parser.next_frame().unwrap().is_none());
        parser.add_data(b"channel\r\nChan").unwrap();
        assert!(parser.next_frame().unwrap().is_none());
        parser.add_data(b"nel: X\r\n\r\n").unwrap();

        let message = AmiMessage::from_frame(parser.next_frame().unwrap().unwrap());
        assert_eq!(message.header("Event"), Some("Newchannel"));
        assert_eq!(message.header("Channel"), Some("X"));
    }

    #[test]
    fn stray_blank_lines_skipped() {
        let mut parser = AmiParser::new();
        parser
            .add_data(b"\r\n\r\nResponse: Success\r\n\r\n")
            .unwrap();
        let frame = parser.next_frame().unwrap().unwrap();
        assert_eq!(frame.lines, vec!["Response: Success"]);
    }

    #[test]
    fn multiple_messages_in_one_read() {
        let mut parser = AmiParser::new();
        parser
            .add_data(b"Event: A\r\n\r\nEvent: B\r\n\r\nResponse: Success\r\n\r\n")
            .unwrap();

        let first = AmiMessage::from_frame(parser.next_frame().unwrap().unwrap());
        let second = AmiMessage::from_frame(parser.next_frame().unwrap().unwrap());
        let third = AmiMessage::from_frame(parser.next_frame().unwrap().unwrap());
        assert_eq!(first.header("Event"), Some("A"));
        assert_eq!(second.header("Event"), Some("B"));
        assert_eq!(*third.kind(), MessageKind::Response);
        assert!(parser.next_frame().unwrap().is_none());
    }

    #[test]
    fn oversized_frame_rejected() {
        let mut parser = AmiParser::new();
        parser.add_data(b"Event: Big\r\n").unwrap();
        assert!(parser.next_frame().unwrap().is_none());

        let huge_line = [b'x'; 8192];
        let mut seen_error = false;
        for _ in 0..(MAX_FRAME_SIZE / 8192 + 2) {
            parser.add_data(&huge_line).unwrap();
            parser.add_data(b"\r\n").unwrap();
            if parser.next_frame().is_err() {
                seen_error = true;
                break;
            }
        }
        assert!(seen_error);
    }

    #[test]
    fn empty_value_is_still_a_header() {
        let message = parse_one(b"Event: Newexten\r\nAppData:\r\n\r\n");
        assert_eq!(message.header("AppData"), Some(""));
        assert!(message.body().is_none());
    }
}
