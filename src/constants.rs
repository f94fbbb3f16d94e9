//! Protocol constants and configuration values

/// Default Asterisk Manager Interface port
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Socket buffer size for reading from the TCP stream (64KB) - standard TCP receive window
pub const SOCKET_BUF_SIZE: usize = 65536;

/// Buffer allocation size (64KB) - used for both initial allocation and growth increments
pub const BUF_CHUNK: usize = 64 * 1024;

/// Maximum single frame size (1MB) - no legitimate AMI message comes close
/// (the largest are `Command` responses with a few hundred lines of output)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum total buffer size (4MB) - safety limit to prevent runaway memory.
/// Indicates a bug or a misbehaving peer if exceeded.
pub const MAX_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// AMI line terminator
pub const LINE_TERMINATOR: &str = "\r\n";

/// Registry key meaning "deliver every event to this observer"
pub const WILDCARD_EVENT: &str = "*";

/// Header value substituted when a frame parses to zero headers, so
/// classification always operates on at least one header
pub const SYNTHETIC_RESPONSE: &str = "Generated Header";

/// Connection establishment / greeting timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Default action response timeout in milliseconds (5 seconds)
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 5000;

/// Maximum number of queued events before dropping
pub const MAX_EVENT_QUEUE_SIZE: usize = 1000;
