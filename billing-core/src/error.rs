use database_layer::DatabaseError;
use error_common::{Entity, FieldError, Reason};
use thiserror::Error;

/// Error taxonomy of the billing core.
///
/// Every variant except `Database` carries the entity it is about, so the
/// boundary can render `<ENTITY>_<REASON>` codes without guessing.
#[derive(Error, Debug)]
pub enum BillingError {
    #[error("{message}")]
    Validation {
        entity: Entity,
        message: String,
        details: Vec<FieldError>,
    },

    #[error("{message}")]
    Duplicate { entity: Entity, message: String },

    #[error("{message}")]
    ForeignKey {
        entity: Entity,
        message: String,
        details: Vec<FieldError>,
    },

    #[error("{message}")]
    Forbidden { entity: Entity, message: String },

    #[error("{message}")]
    DeleteFailed { entity: Entity, message: String },

    #[error("{message}")]
    NotFound { entity: Entity, message: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type BillingResult<T> = Result<T, BillingError>;

impl BillingError {
    pub fn validation(entity: Entity, message: impl Into<String>) -> Self {
        Self::Validation {
            entity,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn validation_with(
        entity: Entity,
        message: impl Into<String>,
        details: Vec<FieldError>,
    ) -> Self {
        Self::Validation {
            entity,
            message: message.into(),
            details,
        }
    }

    pub fn duplicate(entity: Entity, message: impl Into<String>) -> Self {
        Self::Duplicate {
            entity,
            message: message.into(),
        }
    }

    pub fn foreign_key(entity: Entity, message: impl Into<String>) -> Self {
        Self::ForeignKey {
            entity,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn forbidden(entity: Entity, message: impl Into<String>) -> Self {
        Self::Forbidden {
            entity,
            message: message.into(),
        }
    }

    pub fn delete_failed(entity: Entity, message: impl Into<String>) -> Self {
        Self::DeleteFailed {
            entity,
            message: message.into(),
        }
    }

    pub fn not_found(entity: Entity, message: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            message: message.into(),
        }
    }

    /// Machine-readable code. `fallback` names the entity of the operation
    /// being performed, used when the error itself carries none.
    pub fn code(&self, fallback: Entity) -> String {
        match self {
            BillingError::Validation { entity, .. } => Reason::ValidationError.code(*entity),
            BillingError::Duplicate { entity, .. } => Reason::Duplicate.code(*entity),
            BillingError::ForeignKey { entity, .. } => Reason::ForeignKeyError.code(*entity),
            BillingError::Forbidden { entity, .. } => Reason::Forbidden.code(*entity),
            BillingError::DeleteFailed { entity, .. } => Reason::DeleteFailed.code(*entity),
            BillingError::NotFound { entity, .. } => Reason::NotFound.code(*entity),
            BillingError::Database(_) => Reason::InternalError.code(fallback),
        }
    }

    /// Field-level details, when the error carries any.
    pub fn details(&self) -> &[FieldError] {
        match self {
            BillingError::Validation { details, .. } => details,
            BillingError::ForeignKey { details, .. } => details,
            _ => &[],
        }
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(e: sqlx::Error) -> Self {
        BillingError::Database(DatabaseError::SqlxError(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_entity_reason_codes() {
        let err = BillingError::duplicate(Entity::Claim, "claim number taken");
        assert_eq!(err.code(Entity::Claim), "CLAIM_DUPLICATE");

        // A foreign-key failure inside a claim write names the reference.
        let err = BillingError::foreign_key(Entity::Patient, "Patient not found");
        assert_eq!(err.code(Entity::Claim), "PATIENT_FOREIGN_KEY_ERROR");
    }

    #[test]
    fn database_errors_fall_back_to_operation_entity() {
        let err = BillingError::Database(DatabaseError::QueryFailed("boom".into()));
        assert_eq!(err.code(Entity::Visit), "VISIT_INTERNAL_ERROR");
    }

    #[test]
    fn validation_details_surface() {
        let err = BillingError::validation_with(
            Entity::Patient,
            "Missing required insurance fields",
            vec![FieldError::new("subscriberName", "required")],
        );
        assert_eq!(err.details().len(), 1);
        assert_eq!(err.details()[0].field, "subscriberName");
    }
}
