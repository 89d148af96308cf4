//! User management.
//!
//! Credentials are hashed at the boundary before they reach this module;
//! the stored hash never serializes back out. Users who authored timeline
//! entries or uploaded attachments are immutable provenance and cannot be
//! deleted.

use crate::error::{BillingError, BillingResult};
use crate::guard::ensure_no_dependents;
use crate::integrity::{ReferenceCheck, ReferenceValidator};
use crate::models::{User, UserRole};
use crate::principal::Principal;
use crate::time::now_epoch;
use crate::unique::{email_taken, unique_violation};
use database_layer::{DatabasePool, TransactionManager};
use error_common::Entity;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub organization_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserListParams {
    pub search: Option<String>,
    pub role: Option<UserRole>,
}

pub struct UserService {
    pool: DatabasePool,
    validator: ReferenceValidator,
}

impl UserService {
    pub fn new(pool: DatabasePool, validator: ReferenceValidator) -> Self {
        Self { pool, validator }
    }

    fn manager(&self, principal: &Principal) -> TransactionManager {
        TransactionManager::new(self.pool.clone()).with_scope(principal.scope())
    }

    pub async fn list(
        &self,
        principal: &Principal,
        params: &UserListParams,
        limit: i64,
        offset: i64,
    ) -> BillingResult<(Vec<User>, i64)> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM users");
        push_user_filters(&mut count_query, principal.organization_id, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let mut query = QueryBuilder::new("SELECT * FROM users");
        push_user_filters(&mut query, principal.organization_id, params);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let users: Vec<User> = query.build_query_as().fetch_all(&mut *tx).await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok((users, total))
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> BillingResult<User> {
        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE id = $1 AND organization_id = $2")
                .bind(id)
                .bind(principal.organization_id)
                .fetch_optional(self.pool.pool())
                .await?;
        user.ok_or_else(|| BillingError::not_found(Entity::User, "User not found"))
    }

    pub async fn create(&self, principal: &Principal, req: CreateUser) -> BillingResult<User> {
        if req.email.trim().is_empty()
            || req.password_hash.is_empty()
            || req.first_name.trim().is_empty()
            || req.last_name.trim().is_empty()
        {
            return Err(BillingError::validation(
                Entity::User,
                "All required fields must be provided",
            ));
        }
        principal.ensure_own_org(
            req.organization_id,
            Entity::User,
            "Cannot create users outside your organization",
        )?;

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        if email_taken(&mut tx, &req.email, None).await? {
            return Err(BillingError::duplicate(
                Entity::User,
                "User with this email already exists",
            ));
        }
        self.validator
            .validate(
                &mut tx,
                req.organization_id,
                &[ReferenceCheck::new(
                    Entity::Organization,
                    "organizationId",
                    req.organization_id,
                )],
            )
            .await?;

        let now = now_epoch();
        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (
                id, email, password_hash, first_name, last_name, role,
                organization_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.email)
        .bind(&req.password_hash)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(req.role)
        .bind(req.organization_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_violation(
            Entity::User,
            "User with this email already exists",
        ))?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(user)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        req: UpdateUser,
    ) -> BillingResult<User> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        match existing {
            Some(u) if u.organization_id == principal.organization_id => {}
            _ => {
                return Err(BillingError::forbidden(
                    Entity::User,
                    "Cannot update users outside your organization or user not found",
                ))
            }
        }

        let now = now_epoch();
        let user: User = sqlx::query_as(
            r#"
            UPDATE users
            SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                role = COALESCE($4, role),
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(req.role)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(user)
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> BillingResult<()> {
        if principal.user_id == id {
            return Err(BillingError::forbidden(
                Entity::User,
                "Cannot delete your own user account",
            ));
        }

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        match existing {
            Some(u) if u.organization_id == principal.organization_id => {}
            _ => {
                return Err(BillingError::forbidden(
                    Entity::User,
                    "Cannot delete users outside your organization or user not found",
                ))
            }
        }

        let (timeline_entries, attachments): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM claim_timeline WHERE user_id = $1),
                (SELECT COUNT(*) FROM attachments WHERE uploaded_by = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        ensure_no_dependents(
            Entity::User,
            "User has dependent records and cannot be deleted",
            &[
                ("timeline entries", timeline_entries),
                ("attachments", attachments),
            ],
        )?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(BillingError::from)?;
        Ok(())
    }
}

fn push_user_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    organization_id: Uuid,
    params: &UserListParams,
) {
    query.push(" WHERE organization_id = ");
    query.push_bind(organization_id);

    if let Some(search) = &params.search {
        let pattern = format!("%{}%", search);
        query.push(" AND (first_name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR last_name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR email ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(role) = params.role {
        query.push(" AND role = ");
        query.push_bind(role);
    }
}
