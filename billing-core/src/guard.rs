//! Dependent-record deletion guard.
//!
//! A parent may only be deleted when no child records reference it. Each
//! delete operation gathers all dependent counts with a single SQL statement
//! (one consistent snapshot) inside the delete's own transaction, then calls
//! [`ensure_no_dependents`] before touching anything.

use crate::error::{BillingError, BillingResult};
use error_common::Entity;
use tracing::debug;

/// Reject the delete if any dependent count is non-zero. Counts are labeled
/// for diagnostics only; the caller-facing message stays generic.
pub fn ensure_no_dependents(
    entity: Entity,
    message: &str,
    counts: &[(&str, i64)],
) -> BillingResult<()> {
    let blocking: Vec<&str> = counts
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(relation, _)| *relation)
        .collect();

    if blocking.is_empty() {
        return Ok(());
    }

    debug!(entity = %entity, relations = ?blocking, "delete blocked by dependents");
    Err(BillingError::delete_failed(entity, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_counts_allow_delete() {
        let counts = [("visits", 0), ("claims", 0)];
        assert!(ensure_no_dependents(Entity::Provider, "unused", &counts).is_ok());
    }

    #[test]
    fn any_dependent_blocks_delete() {
        let counts = [("visits", 0), ("claims", 3)];
        let err = ensure_no_dependents(
            Entity::Provider,
            "Provider has dependent records and cannot be deleted",
            &counts,
        )
        .unwrap_err();

        match err {
            BillingError::DeleteFailed { entity, .. } => assert_eq!(entity, Entity::Provider),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
