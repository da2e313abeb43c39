use reqwest::StatusCode;
use std::error::Error as StdError;
use thiserror::Error;

/// Why a fetch cycle ended without a snapshot.
///
/// The `Display` output is the message shown to the user; the variant is the
/// cause class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// No API key configured. No request was sent.
    #[error("missing credential")]
    MissingCredential,

    /// Connection, DNS, timeout or body read failure.
    #[error("{0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("{message}")]
    Provider { status: StatusCode, message: String },

    /// Success status, but the body did not match the expected shape.
    #[error("malformed response")]
    MalformedResponse,
}

impl FetchError {
    /// Message used when a non-success body carries no `message` field.
    pub fn fallback_message(status: StatusCode) -> String {
        format!("request failed with status {}", status.as_u16())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::MissingCredential => "configuration",
            FetchError::Transport(_) => "transport",
            FetchError::Provider { .. } => "provider",
            FetchError::MalformedResponse => "malformed-response",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the API key.
        FetchError::Transport(with_causes(&err.without_url()))
    }
}

/// `err` followed by each distinct message in its source chain.
fn with_causes(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_cause() {
        assert_eq!(FetchError::MissingCredential.to_string(), "missing credential");
        assert_eq!(FetchError::MalformedResponse.to_string(), "malformed response");
        assert_eq!(FetchError::Transport("connection refused".into()).to_string(), "connection refused");

        let err = FetchError::Provider {
            status: StatusCode::NOT_FOUND,
            message: "city not found".into(),
        };
        assert_eq!(err.to_string(), "city not found");
        assert_eq!(err.kind(), "provider");
    }

    #[derive(Debug, Error)]
    enum Layer {
        #[error("error sending request")]
        Outer(#[source] Box<Layer>),
        #[error("tcp connect error")]
        Middle(#[source] std::io::Error),
    }

    #[test]
    fn transport_message_includes_cause_chain() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection refused");
        let err = Layer::Outer(Box::new(Layer::Middle(refused)));

        assert_eq!(
            with_causes(&err),
            "error sending request: tcp connect error: Connection refused"
        );
    }

    #[test]
    fn transport_message_skips_repeated_causes() {
        #[derive(Debug, Error)]
        #[error("operation timed out")]
        struct TimedOut;

        #[derive(Debug, Error)]
        #[error("request failed: operation timed out")]
        struct Wrapper(#[source] TimedOut);

        assert_eq!(with_causes(&Wrapper(TimedOut)), "request failed: operation timed out");
    }

    #[test]
    fn fallback_message_names_status() {
        let msg = FetchError::fallback_message(StatusCode::BAD_GATEWAY);
        assert_eq!(msg, "request failed with status 502");
    }
}
