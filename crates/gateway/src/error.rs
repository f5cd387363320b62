use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use boxkeeper_inventory::Error;

/// Inventory error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    // replaces the default client-facing message
    message: Option<&'static str>,
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError { error, message: None }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into()).into()
    }

    pub fn with_message(error: Error, message: &'static str) -> Self {
        ApiError {
            error,
            message: Some(message),
        }
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        let (status, message) = self.default_status_and_message();
        (status, self.message.map(str::to_string).unwrap_or(message))
    }

    fn default_status_and_message(&self) -> (StatusCode, String) {
        match &self.error {
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            Error::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            Error::DuplicateUsername => (
                StatusCode::CONFLICT,
                "The username you entered is already taken. Please choose a different one.".to_string(),
            ),
            Error::DuplicateEmail => (
                StatusCode::CONFLICT,
                "The email address you entered is already in use. Please use a different email.".to_string(),
            ),
            Error::WrongPassword => (
                StatusCode::UNAUTHORIZED,
                "The password you entered is incorrect. Please try again.".to_string(),
            ),
            Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable".to_string()),
            Error::Artifact(_) => (StatusCode::BAD_GATEWAY, "artifact upload failed".to_string()),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.error);
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxkeeper_inventory::StoreError;

    #[test]
    fn error_statuses() {
        let cases = [
            (Error::Unauthorized, StatusCode::UNAUTHORIZED),
            (Error::NotFound, StatusCode::NOT_FOUND),
            (Error::DuplicateUsername, StatusCode::CONFLICT),
            (Error::DuplicateEmail, StatusCode::CONFLICT),
            (Error::WrongPassword, StatusCode::UNAUTHORIZED),
            (Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (Error::Store(StoreError::Timeout(5)), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn message_override_keeps_status() {
        let err = ApiError::with_message(Error::NotFound, "no such account");
        assert_eq!(err.status_and_message(), (StatusCode::NOT_FOUND, "no such account".to_string()));
        assert_eq!(
            ApiError::from(Error::NotFound).status_and_message().1,
            "not found"
        );
    }
}
