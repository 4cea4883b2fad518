use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Sign-in rejected: {0}")]
    ProviderRejected(String),

    #[error("Session is no longer valid")]
    Unauthorized,

    #[error("Rejected by the server: {0}")]
    ValidationRejected(String),

    #[error("Network error: {0}")]
    NetworkUnavailable(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::NetworkUnavailable(e.to_string())
    }
}

/// Maximum length for server messages carried into errors
const MAX_MESSAGE_LENGTH: usize = 200;

impl AuthError {
    fn truncate_message(message: &str) -> String {
        if message.len() <= MAX_MESSAGE_LENGTH {
            message.to_string()
        } else {
            let truncated: String = message.chars().take(MAX_MESSAGE_LENGTH).collect();
            format!("{}...", truncated)
        }
    }

    /// Map a non-success backend response to an error.
    ///
    /// `login` is true for the token-exchange endpoint, where a 401 means the
    /// provider credential was declined rather than that a stored session
    /// went bad.
    pub fn from_status(status: reqwest::StatusCode, message: &str, login: bool) -> Self {
        let message = Self::truncate_message(message);
        match status.as_u16() {
            // Any client rejection of a sign-in means the backend declined
            // the credential; ValidationRejected exists only for profile
            // patches
            400..=499 if login => AuthError::ProviderRejected(message),
            401 | 403 => AuthError::Unauthorized,
            400 | 404 | 422 => AuthError::ValidationRejected(message),
            500..=599 => AuthError::NetworkUnavailable(format!("server error: {}", message)),
            _ => AuthError::NetworkUnavailable(format!("status {}: {}", status, message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_login_401_is_provider_rejected() {
        let err = AuthError::from_status(StatusCode::UNAUTHORIZED, "Invalid access token", true);
        assert!(matches!(err, AuthError::ProviderRejected(_)));
    }

    #[test]
    fn test_login_400_is_provider_rejected() {
        // The backend answers 400 "Access token required" to a malformed
        // sign-in; that is still the backend declining the credential
        let err = AuthError::from_status(StatusCode::BAD_REQUEST, "Access token required", true);
        match err {
            AuthError::ProviderRejected(msg) => assert_eq!(msg, "Access token required"),
            other => panic!("expected ProviderRejected, got {:?}", other),
        }
    }

    #[test]
    fn test_update_401_is_unauthorized() {
        let err = AuthError::from_status(StatusCode::UNAUTHORIZED, "Invalid token", false);
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[test]
    fn test_400_is_validation_rejected() {
        let err = AuthError::from_status(StatusCode::BAD_REQUEST, "Username cannot be empty", false);
        match err {
            AuthError::ValidationRejected(msg) => assert_eq!(msg, "Username cannot be empty"),
            other => panic!("expected ValidationRejected, got {:?}", other),
        }
    }

    #[test]
    fn test_server_errors_map_to_network_unavailable() {
        let err = AuthError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "An error occurred", false);
        assert!(matches!(err, AuthError::NetworkUnavailable(_)));
    }

    #[test]
    fn test_long_messages_are_truncated() {
        let long = "x".repeat(1000);
        let err = AuthError::from_status(StatusCode::BAD_REQUEST, &long, false);
        match err {
            AuthError::ValidationRejected(msg) => assert!(msg.len() < 250),
            other => panic!("expected ValidationRejected, got {:?}", other),
        }
    }
}
