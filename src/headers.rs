//! Typed names for well-known AMI headers.

wire_name_enum! {
    /// Header names with protocol-level meaning in AMI messages.
    ///
    /// Header lookups on messages are case-sensitive; these constants carry
    /// the canonical spelling Asterisk emits. Use with
    /// [`Headers::get()`](crate::protocol::Headers::get) for typed lookups.
    pub enum AmiHeader {
        Action => "Action",
        ActionId => "ActionID",
        Event => "Event",
        Response => "Response",
        Message => "Message",
        Username => "Username",
        Secret => "Secret",
        Channel => "Channel",
        Context => "Context",
        Exten => "Exten",
        Priority => "Priority",
        Variable => "Variable",
        Uniqueid => "Uniqueid",
        Mailbox => "Mailbox",
        Timeout => "Timeout",
        Command => "Command",
        Privilege => "Privilege",
        Cause => "Cause",
    }

    /// Error returned when parsing an unrecognized AMI header name.
    pub error ParseAmiHeaderError = "unknown AMI header";
}
