use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use billing_core::BillingError;
use error_common::{Entity, FieldError};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

/// Standard success envelope: `{success, data, pagination?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<crate::pagination::PaginationMeta>,
}

pub fn api_success<T>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        pagination: None,
    }
}

pub fn api_paginated<T>(data: T, pagination: crate::pagination::PaginationMeta) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        pagination: Some(pagination),
    }
}

/// Error envelope body: `{success: false, error: {code, message, details?}}`.
#[derive(Debug, Serialize)]
struct ApiErrorBody {
    success: bool,
    error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
struct ApiErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<FieldError>,
}

/// Boundary error type. Wraps a core error together with the entity of the
/// operation that produced it, so internal failures still render an
/// entity-prefixed code.
#[derive(Debug)]
pub enum ApiError {
    Billing { entity: Entity, source: BillingError },
    Unauthorized { message: String },
    Forbidden { message: String },
    Internal { entity: Entity, message: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Adapter for `map_err` at call sites: tags core errors with the
    /// entity of the operation being performed.
    pub fn wrap(entity: Entity) -> impl Fn(BillingError) -> ApiError {
        move |source| ApiError::Billing { entity, source }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn internal(entity: Entity, message: impl Into<String>) -> Self {
        Self::Internal {
            entity,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Billing { source, .. } => match source {
                BillingError::Validation { .. } => StatusCode::BAD_REQUEST,
                BillingError::Duplicate { .. } => StatusCode::CONFLICT,
                BillingError::ForeignKey { .. } => StatusCode::NOT_FOUND,
                BillingError::Forbidden { .. } => StatusCode::FORBIDDEN,
                BillingError::DeleteFailed { .. } => StatusCode::CONFLICT,
                BillingError::NotFound { .. } => StatusCode::NOT_FOUND,
                BillingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> String {
        match self {
            ApiError::Billing { entity, source } => source.code(*entity),
            ApiError::Unauthorized { .. } => "AUTH_UNAUTHORIZED".to_string(),
            ApiError::Forbidden { .. } => "AUTH_FORBIDDEN".to_string(),
            ApiError::Internal { entity, .. } => format!("{}_INTERNAL_ERROR", entity.tag()),
        }
    }

    /// Caller-facing message. Internal failures are replaced with a generic
    /// message; the real cause only goes to the log.
    fn public_message(&self) -> String {
        match self {
            ApiError::Billing {
                source: BillingError::Database(_),
                ..
            } => "Internal server error".to_string(),
            ApiError::Billing { source, .. } => source.to_string(),
            ApiError::Unauthorized { message } => message.clone(),
            ApiError::Forbidden { message } => message.clone(),
            ApiError::Internal { .. } => "Internal server error".to_string(),
        }
    }

    fn details(&self) -> Vec<FieldError> {
        match self {
            ApiError::Billing { source, .. } => source.details().to_vec(),
            _ => Vec::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let status = self.status_code();
        let code = self.code();

        if status.is_server_error() {
            let detail = match &self {
                ApiError::Billing { source, .. } => source.to_string(),
                ApiError::Internal { message, .. } => message.clone(),
                _ => String::new(),
            };
            error!(
                error_id = %error_id,
                code = %code,
                status = status.as_u16(),
                detail = %detail,
                "request failed"
            );
        } else {
            warn!(
                error_id = %error_id,
                code = %code,
                status = status.as_u16(),
                "request rejected"
            );
        }

        let body = ApiErrorBody {
            success: false,
            error: ApiErrorDetail {
                code,
                message: self.public_message(),
                details: self.details(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database_layer::DatabaseError;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (
                ApiError::wrap(Entity::Claim)(BillingError::validation(Entity::Claim, "bad")),
                StatusCode::BAD_REQUEST,
                "CLAIM_VALIDATION_ERROR",
            ),
            (
                ApiError::wrap(Entity::Claim)(BillingError::duplicate(Entity::Claim, "dup")),
                StatusCode::CONFLICT,
                "CLAIM_DUPLICATE",
            ),
            (
                ApiError::wrap(Entity::Claim)(BillingError::foreign_key(
                    Entity::Patient,
                    "Patient not found",
                )),
                StatusCode::NOT_FOUND,
                "PATIENT_FOREIGN_KEY_ERROR",
            ),
            (
                ApiError::wrap(Entity::Claim)(BillingError::forbidden(Entity::Claim, "no")),
                StatusCode::FORBIDDEN,
                "CLAIM_FORBIDDEN",
            ),
            (
                ApiError::wrap(Entity::Provider)(BillingError::delete_failed(
                    Entity::Provider,
                    "deps",
                )),
                StatusCode::CONFLICT,
                "PROVIDER_DELETE_FAILED",
            ),
            (
                ApiError::wrap(Entity::Visit)(BillingError::not_found(Entity::Visit, "nope")),
                StatusCode::NOT_FOUND,
                "VISIT_NOT_FOUND",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn internal_errors_hide_their_cause() {
        let err = ApiError::wrap(Entity::Claim)(BillingError::Database(
            DatabaseError::QueryFailed("connection refused to 10.0.0.5".into()),
        ));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "CLAIM_INTERNAL_ERROR");
        assert_eq!(err.public_message(), "Internal server error");
    }
}
