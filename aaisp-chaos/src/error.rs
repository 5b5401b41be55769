use thiserror::Error;

/// Errors returned by the CHAOS client.
#[derive(Debug, Error)]
pub enum ChaosError {
    /// The request could not be sent, timed out, or the body could not be read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with something other than 200 OK.
    #[error("bad response code: {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status { status: u16, message: Option<String> },

    /// The body was not the expected JSON envelope.
    #[error("{0}")]
    Decode(String),

    /// The API answered 200 OK but reported an error in the envelope.
    #[error("{0}")]
    Upstream(String),

    #[error("no account or control credentials set")]
    Credentials,
}

impl ChaosError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ChaosError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The error string the API put in its envelope, whatever the status.
    pub fn upstream_message(&self) -> Option<&str> {
        match self {
            ChaosError::Upstream(message) => Some(message),
            ChaosError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ChaosError::Transport(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, ChaosError::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = ChaosError::Status { status: 503, message: None };
        assert_eq!(err.to_string(), "bad response code: 503");
        assert_eq!(err.status(), Some(503));

        let err = ChaosError::Status {
            status: 403,
            message: Some("Access denied".to_string()),
        };
        assert_eq!(err.to_string(), "bad response code: 403: Access denied");
        assert_eq!(err.upstream_message(), Some("Access denied"));
    }

    #[test]
    fn test_upstream_display_is_message() {
        let err = ChaosError::Upstream("Invalid control login".to_string());
        assert_eq!(err.to_string(), "Invalid control login");
        assert_eq!(err.status(), None);
        assert_eq!(err.upstream_message(), Some("Invalid control login"));
    }

    #[test]
    fn test_no_upstream_message() {
        assert_eq!(ChaosError::Status { status: 500, message: None }.upstream_message(), None);
        assert_eq!(ChaosError::Decode("bad".to_string()).upstream_message(), None);
    }
}
