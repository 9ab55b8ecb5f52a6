//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>` and use `?` on
//! anything that converts into `AppError`; the status, body and log level all
//! come from the error's `ErrorMetadata`.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use tram_core::{AppError, ErrorMetadata, FieldErrors, LogLevel};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    /// Per-field messages for rejected report data, keyed by path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

/// Wrapper so `IntoResponse` can be implemented for the core error type.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::BadRequest(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that rejects with our `ErrorResponse` shape.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

static ERROR_DETAILS_VISIBLE: AtomicBool = AtomicBool::new(false);

/// Whether responses carry `details` and `error_type` for non-sensitive
/// errors. Set from the configured environment when the router is built;
/// hidden until then.
pub fn set_error_details_visible(visible: bool) {
    ERROR_DETAILS_VISIBLE.store(visible, Ordering::Relaxed);
}

impl ErrorResponse {
    pub fn from_app_error(app_error: &AppError, details_visible: bool) -> Self {
        let show_details = details_visible && !app_error.is_sensitive();
        Self {
            error: app_error.client_message(),
            details: show_details.then(|| app_error.detailed_message()),
            error_type: show_details.then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
            fields: app_error.field_errors().cloned(),
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = ErrorResponse::from_app_error(
            app_error,
            ERROR_DETAILS_VISIBLE.load(Ordering::Relaxed),
        );

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_carries_fields() {
        let mut fields = FieldErrors::new();
        fields.add("sentences[0].text", "This field is required.");
        let response = HttpAppError(AppError::Validation(fields)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(
            body["fields"]["sentences[0].text"][0],
            "This field is required."
        );
    }

    #[tokio::test]
    async fn test_sensitive_error_hides_details() {
        let response =
            HttpAppError(AppError::Internal("connection string leaked".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("details").is_none());
        assert!(body.get("fields").is_none());
    }

    #[test]
    fn test_details_follow_visibility_setting() {
        let error = AppError::NotFound("Report 7 not found".into());

        let shown = ErrorResponse::from_app_error(&error, true);
        assert!(shown.details.is_some());
        assert!(shown.error_type.is_some());

        let hidden = ErrorResponse::from_app_error(&error, false);
        assert!(hidden.details.is_none());
        assert!(hidden.error_type.is_none());
        assert_eq!(hidden.code, shown.code);
        assert_eq!(hidden.error, shown.error);
    }

    #[test]
    fn test_sensitive_details_hidden_even_when_visible() {
        let error = AppError::Internal("connection string leaked".into());
        let body = ErrorResponse::from_app_error(&error, true);
        assert!(body.details.is_none());
        assert!(body.error_type.is_none());
    }
}
