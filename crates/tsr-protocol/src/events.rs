//! Names of the events a connection publishes.

/// The transport opened.
pub const CONNECTION_OPEN: &str = "connectionOpen";

/// The transport closed.
pub const CONNECTION_CLOSED: &str = "connectionClosed";

/// A fault surfaced from inside a transport notification.
pub const ERROR: &str = "error";

/// Any inbound message.
pub const INCOMING_MESSAGE: &str = "incomingMessage";

/// The handshake was accepted.
pub const READY: &str = "ready";

/// Prefix of per-message-type event names.
pub const SYNTHESIZED_PREFIX: &str = "on";

/// Derives the per-type event name for a message type.
///
/// The first character is upper-cased and the prefix prepended, so `"foo"`
/// becomes `"onFoo"`. Returns `None` for an empty type.
pub fn synthesized_event_name(kind: &str) -> Option<String> {
    let mut chars = kind.chars();
    let first = chars.next()?;

    let mut name = String::with_capacity(SYNTHESIZED_PREFIX.len() + kind.len());
    name.push_str(SYNTHESIZED_PREFIX);
    name.extend(first.to_uppercase());
    name.push_str(chars.as_str());
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_name() {
        assert_eq!(synthesized_event_name("foo").as_deref(), Some("onFoo"));
        assert_eq!(synthesized_event_name("auth").as_deref(), Some("onAuth"));
        assert_eq!(
            synthesized_event_name("clientMoved").as_deref(),
            Some("onClientMoved")
        );
        assert_eq!(synthesized_event_name("X").as_deref(), Some("onX"));
    }

    #[test]
    fn test_synthesized_name_empty() {
        assert_eq!(synthesized_event_name(""), None);
    }

    #[test]
    fn test_synthesized_name_non_ascii() {
        assert_eq!(synthesized_event_name("über").as_deref(), Some("onÜber"));
    }
}
