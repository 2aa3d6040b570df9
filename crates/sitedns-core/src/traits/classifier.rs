// # Error Classifier
//
// Provider capability that maps a provider failure onto an [`ErrorKind`].
//
// The reconciliation engine never matches on error text. Each provider
// supplies its own classification (error codes, HTTP status mapping); the
// default implementation covers the variants of [`crate::Error`] and falls
// back to message markers for payloads without a known code.

use crate::error::{ApiMessage, Error, ErrorKind};

/// Message fragments that mean the desired object is already present
pub const ALREADY_EXISTS_MARKERS: &[&str] = &["already exists", "already linked"];

/// Classify raw provider messages by their text
///
/// Returns [`ErrorKind::AlreadyExists`] when any message contains one of
/// [`ALREADY_EXISTS_MARKERS`] (case-insensitive), [`ErrorKind::Provider`]
/// otherwise.
pub fn classify_messages(messages: &[ApiMessage]) -> ErrorKind {
    let exists = messages.iter().any(|m| {
        let text = m.message.to_ascii_lowercase();
        ALREADY_EXISTS_MARKERS.iter().any(|marker| text.contains(marker))
    });

    if exists {
        ErrorKind::AlreadyExists
    } else {
        ErrorKind::Provider
    }
}

/// Classify an error using only its variant and message markers
pub fn default_classification(error: &Error) -> ErrorKind {
    match error {
        Error::Authentication(_) => ErrorKind::Authentication,
        Error::RateLimited(_) => ErrorKind::RateLimited,
        Error::NotFound(_) => ErrorKind::NotFound,
        Error::Http(_) | Error::Json(_) => ErrorKind::Transport,
        Error::Api { messages, .. } => classify_messages(messages),
        Error::Status { kind, .. } => *kind,
        Error::Config(_) | Error::InvalidInput(_) | Error::Other(_) => ErrorKind::Provider,
    }
}

/// Provider capability: classify a failure returned by the provider
pub trait ErrorClassifier: Send + Sync {
    /// Map an error returned by one of this provider's calls to an [`ErrorKind`]
    fn classify_error(&self, error: &Error) -> ErrorKind {
        default_classification(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_exists_marker_is_case_insensitive() {
        let messages = vec![ApiMessage::new("Record Already Exists.")];
        assert_eq!(classify_messages(&messages), ErrorKind::AlreadyExists);
    }

    #[test]
    fn any_message_may_carry_the_marker() {
        let messages = vec![
            ApiMessage::new("validation failed"),
            ApiMessage::new("domain already linked to project"),
        ];
        assert_eq!(classify_messages(&messages), ErrorKind::AlreadyExists);
    }

    #[test]
    fn other_messages_are_provider_errors() {
        let messages = vec![ApiMessage::new("invalid content")];
        assert_eq!(classify_messages(&messages), ErrorKind::Provider);
        assert_eq!(classify_messages(&[]), ErrorKind::Provider);
    }

    #[test]
    fn variants_map_to_kinds() {
        assert_eq!(
            default_classification(&Error::auth("bad key")),
            ErrorKind::Authentication
        );
        assert_eq!(
            default_classification(&Error::http("connection reset")),
            ErrorKind::Transport
        );
        assert_eq!(
            default_classification(&Error::not_found("zone")),
            ErrorKind::NotFound
        );
        assert_eq!(
            default_classification(&Error::rate_limited("slow down")),
            ErrorKind::RateLimited
        );
        assert_eq!(
            default_classification(&Error::status(
                "cloudflare",
                502,
                ErrorKind::Transport,
                Vec::new()
            )),
            ErrorKind::Transport
        );
    }
}
