use thiserror::Error;

/// Errors returned by [`super::MinifluxClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx response. `message` is the server's `error_message` when present.
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
    #[error("API token contains characters not allowed in a header")]
    InvalidToken,
    #[error("Unexpected response body: {0}")]
    Decode(String),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
}

impl ApiError {
    /// HTTP status code, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True for 401/403, which mean the token is wrong rather than the request.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display_uses_server_message() {
        let err = ApiError::Status {
            status: 400,
            message: "This feed already exists".into(),
        };
        assert_eq!(err.to_string(), "This feed already exists (HTTP 400)");
        assert_eq!(err.status(), Some(400));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_unauthorized() {
        let err = ApiError::Status {
            status: 401,
            message: "Access Unauthorized".into(),
        };
        assert!(err.is_unauthorized());
        assert!(!ApiError::InvalidToken.is_unauthorized());
    }
}
