use std::fmt;

/// Errors from the thread service and the agent stream.
///
/// None of these are retried by the clients; callers decide what to do.
#[derive(Debug, Clone, PartialEq)]
pub enum CortexError {
    /// Any non-2xx response. Carries the original status and body.
    Http { status: u16, body: String },
    /// The thread no longer exists (HTTP 404 on a thread path).
    NotFound(String),
    /// Transport failure or idle timeout after the stream was opened.
    Stream(String),
    /// The request could not be sent (DNS, connect, timeout).
    Network(String),
    /// A 2xx body that does not decode.
    Decode(String),
    /// The stream read was cancelled by the caller.
    Cancelled,
}

impl fmt::Display for CortexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CortexError::Http { status, body } => write!(f, "HTTP {status}: {body}"),
            CortexError::NotFound(id) => write!(f, "thread {id} no longer exists"),
            CortexError::Stream(msg) => write!(f, "stream error: {msg}"),
            CortexError::Network(msg) => write!(f, "network error: {msg}"),
            CortexError::Decode(msg) => write!(f, "decode error: {msg}"),
            CortexError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for CortexError {}

impl CortexError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CortexError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display_keeps_status_and_body() {
        let err = CortexError::Http {
            status: 401,
            body: "bad token".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 401: bad token");
    }

    #[test]
    fn test_not_found_display() {
        let err = CortexError::NotFound("t-1".to_string());
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "thread t-1 no longer exists");
    }
}
