use serde::Serialize;
use thiserror::Error;

use crate::domain::complaint::{ComplaintId, ComplaintStatus};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("complaint {complaint_id} cannot move from {from} to {to}")]
    InvalidTransition { complaint_id: ComplaintId, from: ComplaintStatus, to: ComplaintStatus },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("complaint {0} was modified concurrently")]
    Conflict(ComplaintId),
    #[error("dependency failure: {0}")]
    DependencyFailure(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

/// The stable error vocabulary callers branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    ValidationError,
    InvalidTransition,
    Conflict,
    DependencyFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::ValidationError => "validation_error",
            Self::InvalidTransition => "invalid_transition",
            Self::Conflict => "conflict",
            Self::DependencyFailure => "dependency_failure",
        }
    }
}

impl ApplicationError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Domain(DomainError::Validation(message.into()))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Domain(DomainError::Forbidden(message.into()))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(DomainError::InvalidTransition { .. }) => ErrorKind::InvalidTransition,
            Self::Domain(DomainError::Forbidden(_)) => ErrorKind::Forbidden,
            Self::Domain(DomainError::Validation(_)) => ErrorKind::ValidationError,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::DependencyFailure(_) | Self::Configuration(_) => ErrorKind::DependencyFailure,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::InvalidState { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("invalid state: {message}")]
    InvalidState { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not allowed to perform this action.",
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::InvalidState { .. } => {
                "The complaint is closed or cannot move to the requested status."
            }
            Self::Conflict { .. } => {
                "The complaint was updated by someone else. Reload and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::InvalidState { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::InvalidState { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Validation(_)) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::Forbidden(_)) => {
                Self::Forbidden { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::InvalidTransition { .. }) => {
                Self::InvalidState { message, correlation_id }
            }
            ApplicationError::NotFound { .. } => Self::NotFound { message, correlation_id },
            ApplicationError::Conflict(_) => Self::Conflict { message, correlation_id },
            ApplicationError::DependencyFailure(_) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(_) => Self::Internal { message, correlation_id },
        }
    }
}
