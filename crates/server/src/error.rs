use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use grievance_core::errors::{ApplicationError, ErrorKind, InterfaceError};

/// Error body returned by every route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub correlation_id: String,
    pub retryable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        let kind = error.kind();
        let interface = error.into_interface(correlation_id);
        let detail = match &interface {
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => None,
            other => Some(other.message().to_owned()),
        };

        Self {
            status: status_for(kind),
            body: ErrorBody {
                code: kind.as_str(),
                message: interface.user_message().to_owned(),
                detail,
                correlation_id: interface.correlation_id().to_owned(),
                retryable: matches!(kind, ErrorKind::Conflict | ErrorKind::DependencyFailure),
            },
        }
    }

    pub fn unauthenticated(correlation_id: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorBody {
                code: "unauthenticated",
                message: "A valid session token is required.".to_owned(),
                detail: None,
                correlation_id: correlation_id.to_owned(),
                retryable: false,
            },
        }
    }

    /// A value outside a closed vocabulary (status, priority, visibility).
    pub fn unprocessable(detail: impl Into<String>, correlation_id: &str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: ErrorBody {
                code: ErrorKind::ValidationError.as_str(),
                message: "The request could not be processed. Check inputs and try again."
                    .to_owned(),
                detail: Some(detail.into()),
                correlation_id: correlation_id.to_owned(),
                retryable: false,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &ErrorBody {
        &self.body
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidTransition | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::DependencyFailure => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = self.body.retryable.then(|| HeaderValue::from_static("1"));
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(value) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}
