//! Scoped-uniqueness enforcement.
//!
//! The unique indexes in the schema are the authoritative guard; the
//! pre-checks here exist to turn an inevitable constraint violation into a
//! friendly `Duplicate` error naming the field. Both the pre-check and the
//! insert run in the same transaction.

use crate::error::{BillingError, BillingResult};
use error_common::Entity;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

/// Postgres unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

fn exists_sql(table: &str, column: &str, exclude: bool) -> String {
    let mut sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE organization_id = $1 AND {} = $2",
        table, column
    );
    if exclude {
        sql.push_str(" AND id <> $3");
    }
    sql.push(')');
    sql
}

/// Is `value` already taken for `column` within the organization, excluding
/// the record being updated?
pub async fn scoped_value_taken(
    tx: &mut Transaction<'_, Postgres>,
    table: &'static str,
    column: &'static str,
    organization_id: Uuid,
    value: &str,
    exclude_id: Option<Uuid>,
) -> BillingResult<bool> {
    let sql = exists_sql(table, column, exclude_id.is_some());
    let mut query = sqlx::query_scalar::<_, bool>(&sql)
        .bind(organization_id)
        .bind(value);
    if let Some(id) = exclude_id {
        query = query.bind(id);
    }
    Ok(query.fetch_one(&mut **tx).await?)
}

/// Email uniqueness is global, not organization-scoped.
pub async fn email_taken(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
    exclude_id: Option<Uuid>,
) -> BillingResult<bool> {
    let sql = if exclude_id.is_some() {
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND id <> $2)"
    } else {
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)"
    };
    let mut query = sqlx::query_scalar::<_, bool>(sql).bind(email);
    if let Some(id) = exclude_id {
        query = query.bind(id);
    }
    Ok(query.fetch_one(&mut **tx).await?)
}

/// Map a storage-level unique violation (a racing writer beat the pre-check)
/// to the same `Duplicate` error the pre-check would have produced.
pub fn unique_violation(
    entity: Entity,
    message: &'static str,
) -> impl FnOnce(sqlx::Error) -> BillingError {
    move |e| {
        let is_unique = e
            .as_database_error()
            .and_then(|d| d.code())
            .map_or(false, |code| code == UNIQUE_VIOLATION);
        if is_unique {
            BillingError::duplicate(entity, message)
        } else {
            BillingError::from(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exists_sql_scopes_to_organization() {
        let sql = exists_sql("claims", "claim_number", false);
        assert_eq!(
            sql,
            "SELECT EXISTS(SELECT 1 FROM claims WHERE organization_id = $1 AND claim_number = $2)"
        );
    }

    #[test]
    fn exists_sql_excludes_record_under_update() {
        let sql = exists_sql("providers", "npi", true);
        assert!(sql.ends_with("AND npi = $2 AND id <> $3)"));
    }
}
