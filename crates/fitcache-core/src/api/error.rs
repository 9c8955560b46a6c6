use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Version conflict: {0}")]
    Conflict(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error bodies from the backend look like `{"error": "..."}` or `{"message": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Keep only the message of a JSON error body, so extra fields such as
    /// stack traces cannot push it past the truncation point.
    fn condense_body(body: &str) -> String {
        match Self::parse_message(body) {
            Some(message) => serde_json::json!({ "error": Self::truncate_body(&message) }).to_string(),
            None => Self::truncate_body(body),
        }
    }

    fn parse_message(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        parsed
            .error
            .or(parsed.message)
            .filter(|m| !m.trim().is_empty())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::condense_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            409 => ApiError::Conflict(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Failures worth trying again later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited | ApiError::ServerError(_) | ApiError::NetworkError(_)
        )
    }

    /// The human-readable message the server put in its error body, if any.
    pub fn server_message(&self) -> Option<String> {
        let body = match self {
            ApiError::AccessDenied(body)
            | ApiError::NotFound(body)
            | ApiError::Conflict(body)
            | ApiError::ServerError(body) => body.as_str(),
            ApiError::InvalidResponse(text) => text.split_once(": ").map(|(_, b)| b)?,
            _ => return None,
        };
        Self::parse_message(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(ApiError::from_status(StatusCode::UNAUTHORIZED, ""), ApiError::Unauthorized));
        assert!(matches!(ApiError::from_status(StatusCode::NOT_FOUND, "x"), ApiError::NotFound(_)));
        assert!(matches!(ApiError::from_status(StatusCode::CONFLICT, "x"), ApiError::Conflict(_)));
        assert!(matches!(ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""), ApiError::RateLimited));
        assert!(matches!(ApiError::from_status(StatusCode::BAD_GATEWAY, "x"), ApiError::ServerError(_)));
        assert!(matches!(ApiError::from_status(StatusCode::BAD_REQUEST, "x"), ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "é".repeat(400);
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        let ApiError::ServerError(msg) = err else {
            panic!("expected server error");
        };
        assert!(msg.contains("truncated, 800 total bytes"));
    }

    #[test]
    fn test_long_json_body_keeps_server_message() {
        let body = serde_json::json!({
            "error": "Quota exceeded",
            "stack": "at generatePlans ".repeat(60),
        })
        .to_string();
        assert!(body.len() > MAX_ERROR_BODY_LENGTH);

        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert_eq!(err.server_message().as_deref(), Some("Quota exceeded"));

        let err = ApiError::from_status(StatusCode::BAD_REQUEST, &body);
        assert_eq!(err.server_message().as_deref(), Some("Quota exceeded"));
    }

    #[test]
    fn test_server_message_extraction() {
        let err = ApiError::from_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": "Quiz incompleto"}"#,
        );
        assert_eq!(err.server_message().as_deref(), Some("Quiz incompleto"));

        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"message": "userId required"}"#);
        assert_eq!(err.server_message().as_deref(), Some("userId required"));

        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert_eq!(err.server_message(), None);

        assert_eq!(ApiError::Unauthorized.server_message(), None);
    }

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::RateLimited.is_transient());
        assert!(ApiError::ServerError(String::new()).is_transient());
        assert!(!ApiError::Unauthorized.is_transient());
        assert!(!ApiError::Conflict(String::new()).is_transient());
    }
}
