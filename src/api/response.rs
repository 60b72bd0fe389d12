//! Response envelopes and error mapping for the HTTP layer

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::Error;

/// Standard API response wrapper for non-document endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Optional message describing the result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful API response with data
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// Create a successful API response with data and message
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

/// Error body returned for every failed request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,
    /// Error message
    pub error: String,
    /// Itemized details, e.g. field-level validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    /// Error body without details
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: None,
        }
    }
}

/// Engine error on its way to becoming an HTTP response
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    expose_internal: bool,
}

impl ApiError {
    /// Wrap an error; `expose_internal` controls whether 5xx messages are shown
    pub fn new(error: Error, expose_internal: bool) -> Self {
        Self {
            error,
            expose_internal,
        }
    }

    /// The wrapped error
    pub fn error(&self) -> &Error {
        &self.error
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self::new(error, false)
    }
}

/// Status code for an engine error
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::PreconditionRequired => StatusCode::PRECONDITION_REQUIRED,
        Error::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Error::Store(_)
        | Error::Config(_)
        | Error::Serialization(_)
        | Error::Metrics(_)
        | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);

        let message = if self.error.is_server_error() {
            tracing::error!(error = %self.error, kind = self.error.kind(), "Request failed");
            if self.expose_internal {
                self.error.to_string()
            } else {
                "Internal server error".to_string()
            }
        } else {
            tracing::debug!(error = %self.error, kind = self.error.kind(), "Request rejected");
            self.error.to_string()
        };

        let details = match &self.error {
            Error::Validation(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        };
        let body = Json(ErrorResponse {
            success: false,
            error: message,
            details,
        });

        if matches!(self.error, Error::Unauthorized(_)) {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

/// JSON body extractor that reports malformed input with an [`ErrorResponse`]
pub struct JsonRequest<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonRequest<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonRequest(value)),
            Err(rejection) => {
                let message = match rejection {
                    JsonRejection::JsonDataError(_) => "Invalid JSON data",
                    JsonRejection::JsonSyntaxError(_) => "Malformed JSON",
                    JsonRejection::MissingJsonContentType(_) => {
                        "Missing or invalid Content-Type header. Expected 'application/json'"
                    }
                    JsonRejection::BytesRejection(_) => "Failed to read request body",
                    _ => "Invalid JSON request",
                };

                tracing::warn!("JSON parsing error: {}", message);
                Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))))
            }
        }
    }
}
