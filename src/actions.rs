//! Named manager actions.
//!
//! Each method is a thin field-mapping wrapper over
//! [`AmiClient::send_action`]: it builds the header block and returns the
//! server's response untouched. Command semantics are not interpreted here;
//! the one exception is [`login`](AmiClient::login), which tears the
//! connection down on rejection so callers can tell bad credentials from a
//! network fault.

use tracing::warn;

use crate::command::{AmiAction, AmiResponse};
use crate::connection::AmiClient;
use crate::error::{AmiError, AmiResult};
use crate::headers::AmiHeader;

/// Parameters for the `Originate` action.
///
/// `channel` and `exten` are required; everything else is optional and
/// omitted from the wire when unset. Channel variables are sent as repeated
/// `Variable: name=value` headers.
#[derive(Debug, Clone, Default)]
pub struct Originate {
    /// Channel to call first, e.g. `SIP/101`.
    pub channel: String,
    /// Extension to connect the answered channel to.
    pub exten: String,
    /// Dialplan context for the extension.
    pub context: Option<String>,
    /// Dialplan priority, usually `1`.
    pub priority: Option<String>,
    /// Originate timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Caller ID to present on the new channel.
    pub caller_id: Option<String>,
    /// Account code to bill the call under.
    pub account: Option<String>,
    /// Channel variables, sent as repeated `Variable:` headers in order.
    pub variables: Vec<(String, String)>,
}

impl AmiClient {
    /// Authenticate the session.
    ///
    /// On an error-class response the connection is torn down and
    /// [`AmiError::AuthenticationFailed`] is returned, so a credential
    /// problem never masquerades as a generic protocol error.
    pub async fn login(&self, username: &str, secret: &str) -> AmiResult<AmiResponse> {
        let action = AmiAction::new("Login")
            .header(AmiHeader::Username, username)?
            .header(AmiHeader::Secret, secret)?;

        let response = self.send_action(action).await?;
        if response.is_error() {
            let reason = response.text().unwrap_or("authentication failed").to_string();
            warn!("login rejected, tearing down connection");
            let _ = self.quit().await;
            return Err(AmiError::auth_failed(reason));
        }
        Ok(response)
    }

    /// Log the session off. The server usually closes the socket shortly
    /// after replying.
    pub async fn logoff(&self) -> AmiResult<AmiResponse> {
        self.send_action(AmiAction::new("Logoff")).await
    }

    /// Keepalive round-trip.
    pub async fn ping(&self) -> AmiResult<AmiResponse> {
        self.send_action(AmiAction::new("Ping")).await
    }

    /// Hang up the named channel.
    pub async fn hangup(&self, channel: &str) -> AmiResult<AmiResponse> {
        let action = AmiAction::new("Hangup").header(AmiHeader::Channel, channel)?;
        self.send_action(action).await
    }

    /// Channel status; all channels when `channel` is `None`. The details
    /// arrive as follow-up `Status` events correlated by `ActionID`.
    pub async fn status(&self, channel: Option<&str>) -> AmiResult<AmiResponse> {
        let action = AmiAction::new("Status").opt_header(AmiHeader::Channel, channel)?;
        self.send_action(action).await
    }

    /// Redirect (transfer) a channel to the given dialplan position.
    pub async fn redirect(
        &self,
        channel: &str,
        exten: &str,
        priority: &str,
        context: Option<&str>,
        extra_channel: Option<&str>,
    ) -> AmiResult<AmiResponse> {
        let action = AmiAction::new("Redirect")
            .header(AmiHeader::Channel, channel)?
            .header(AmiHeader::Exten, exten)?
            .header(AmiHeader::Priority, priority)?
            .opt_header(AmiHeader::Context, context)?
            .opt_header("ExtraChannel", extra_channel)?;
        self.send_action(action).await
    }

    /// Originate a call.
    ///
    /// The response only acknowledges queueing; the outcome arrives later
    /// as an `OriginateResponse` event carrying this action's `ActionID`.
    pub async fn originate(&self, params: Originate) -> AmiResult<AmiResponse> {
        let mut action = AmiAction::new("Originate")
            .header(AmiHeader::Channel, &params.channel)?
            .header(AmiHeader::Exten, &params.exten)?
            .opt_header(AmiHeader::Context, params.context.as_deref())?
            .opt_header(AmiHeader::Priority, params.priority.as_deref())?
            .opt_header(
                AmiHeader::Timeout,
                params.timeout_ms.map(|t| t.to_string()).as_deref(),
            )?
            .opt_header("CallerID", params.caller_id.as_deref())?
            .opt_header("Account", params.account.as_deref())?;
        for (name, value) in &params.variables {
            action = action.header(AmiHeader::Variable, &format!("{}={}", name, value))?;
        }
        self.send_action(action).await
    }

    /// Waiting-message indication for a mailbox.
    pub async fn mailbox_status(&self, mailbox: &str) -> AmiResult<AmiResponse> {
        let action = AmiAction::new("MailboxStatus").header(AmiHeader::Mailbox, mailbox)?;
        self.send_action(action).await
    }

    /// New/old message counts for a mailbox.
    pub async fn mailbox_count(&self, mailbox: &str) -> AmiResult<AmiResponse> {
        let action = AmiAction::new("MailboxCount").header(AmiHeader::Mailbox, mailbox)?;
        self.send_action(action).await
    }

    /// Run a CLI command; its output is the response body.
    pub async fn command(&self, command: &str) -> AmiResult<AmiResponse> {
        let action = AmiAction::new("Command").header(AmiHeader::Command, command)?;
        self.send_action(action).await
    }

    /// Query the state of an extension in a context.
    pub async fn extension_state(&self, exten: &str, context: &str) -> AmiResult<AmiResponse> {
        let action = AmiAction::new("ExtensionState")
            .header(AmiHeader::Exten, exten)?
            .header(AmiHeader::Context, context)?;
        self.send_action(action).await
    }

    /// Hang up a channel after `timeout_secs` seconds.
    pub async fn absolute_timeout(
        &self,
        channel: &str,
        timeout_secs: u64,
    ) -> AmiResult<AmiResponse> {
        let action = AmiAction::new("AbsoluteTimeout")
            .header(AmiHeader::Channel, channel)?
            .header(AmiHeader::Timeout, &timeout_secs.to_string())?;
        self.send_action(action).await
    }
}
