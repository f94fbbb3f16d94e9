//! Asterisk Manager Interface (AMI) client for Rust
//!
//! This crate provides an async Rust client for the Asterisk Manager
//! Interface: connect to the manager socket, issue actions, and observe the
//! asynchronous event stream — all over one persistent TCP connection.
//!
//! # Architecture
//!
//! One connection runs three cooperating contexts:
//! - [`AmiClient`] (Clone + Send) — send actions from any task; each call
//!   returns that action's response even when events interleave on the wire
//! - a background reader task that owns the socket's read half and routes
//!   every inbound message
//! - a background dispatcher task that invokes registered observers, one
//!   event at a time
//!
//! # Examples
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, AmiError, DispatchControl, DEFAULT_AMI_PORT};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AmiError> {
//!     let (client, greeting) = AmiClient::connect("localhost", DEFAULT_AMI_PORT).await?;
//!     println!("connected to {}", greeting);
//!
//!     client.login("admin", "secret").await?;
//!
//!     client.register("Hangup", |event, _client| {
//!         println!("hangup on {}", event.header("Channel").unwrap_or("?"));
//!         DispatchControl::Continue
//!     });
//!
//!     let response = client.ping().await?;
//!     assert!(response.is_success());
//!
//!     client.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Observing every event
//!
//! Register under the `"*"` wildcard to receive all events. Wildcard
//! observers run after any observers registered for the event's own name:
//!
//! ```rust,no_run
//! # async fn example(client: &asterisk_ami_tokio::AmiClient) {
//! use asterisk_ami_tokio::{DispatchControl, WILDCARD_EVENT};
//!
//! client.register(WILDCARD_EVENT, |event, client| {
//!     if event.name() == "Shutdown" {
//!         client.request_quit();
//!     }
//!     DispatchControl::Continue
//! });
//! # }
//! ```
//!
//! ## Custom actions
//!
//! Anything not covered by the named wrappers goes through
//! [`AmiAction`] and [`AmiClient::send_action`]:
//!
//! ```rust,no_run
//! # async fn example(client: &asterisk_ami_tokio::AmiClient) -> Result<(), asterisk_ami_tokio::AmiError> {
//! use asterisk_ami_tokio::AmiAction;
//!
//! let action = AmiAction::new("QueueStatus").header("Queue", "support")?;
//! let response = client.send_action(action).await?;
//! println!("{:?}", response.response());
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;

pub mod actions;
pub mod command;
pub mod connection;
pub mod constants;
pub mod error;
pub mod event;
pub mod headers;
pub mod protocol;

pub(crate) mod buffer;
pub(crate) mod registry;

pub use actions::Originate;
pub use command::{AmiAction, AmiResponse};
pub use connection::{AmiClient, ConnectionState};
pub use constants::{DEFAULT_AMI_PORT, WILDCARD_EVENT};
pub use error::{AmiError, AmiResult};
pub use event::{AmiEvent, DispatchControl};
pub use headers::AmiHeader;
pub use protocol::{AmiMessage, Greeting, Headers, MessageKind};
