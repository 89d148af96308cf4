use serde::{Deserialize, Serialize};

/// Field-level detail attached to validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_error_serializes_flat() {
        let err = FieldError::new("subscriberName", "required for dependent coverage");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["field"], "subscriberName");
        assert_eq!(json["message"], "required for dependent coverage");
    }
}
