//! Automation rule definitions and their execution log.
//!
//! A rule's flow graph is validated for shape and stored opaquely; executing
//! it is somebody else's job. Executions are exposed read-only.

use crate::error::{BillingError, BillingResult};
use crate::flow::validate_flow_data;
use crate::guard::ensure_no_dependents;
use crate::models::{Rule, RuleExecution};
use crate::principal::Principal;
use crate::time::now_epoch;
use crate::unique::{scoped_value_taken, unique_violation};
use database_layer::{DatabasePool, TransactionManager};
use error_common::Entity;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRule {
    pub name: String,
    pub description: Option<String>,
    pub organization_id: Uuid,
    pub trigger_type: Option<String>,
    pub is_active: Option<bool>,
    pub flow_data: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRule {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub flow_data: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleListParams {
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleExecutionListParams {
    pub rule_id: Option<Uuid>,
    pub claim_id: Option<Uuid>,
    pub status: Option<String>,
    pub date_from: Option<i64>,
    pub date_to: Option<i64>,
}

pub struct RuleService {
    pool: DatabasePool,
}

impl RuleService {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn manager(&self, principal: &Principal) -> TransactionManager {
        TransactionManager::new(self.pool.clone()).with_scope(principal.scope())
    }

    pub async fn list(
        &self,
        principal: &Principal,
        params: &RuleListParams,
        limit: i64,
        offset: i64,
    ) -> BillingResult<(Vec<Rule>, i64)> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM rules");
        push_rule_filters(&mut count_query, principal.organization_id, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let mut query = QueryBuilder::new("SELECT * FROM rules");
        push_rule_filters(&mut query, principal.organization_id, params);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let rules: Vec<Rule> = query.build_query_as().fetch_all(&mut *tx).await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok((rules, total))
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> BillingResult<Rule> {
        let rule: Option<Rule> =
            sqlx::query_as("SELECT * FROM rules WHERE id = $1 AND organization_id = $2")
                .bind(id)
                .bind(principal.organization_id)
                .fetch_optional(self.pool.pool())
                .await?;
        rule.ok_or_else(|| BillingError::not_found(Entity::Rule, "Rule not found"))
    }

    pub async fn create(&self, principal: &Principal, req: CreateRule) -> BillingResult<Rule> {
        if req.name.trim().is_empty() {
            return Err(BillingError::validation(
                Entity::Rule,
                "Missing required rule fields",
            ));
        }
        validate_flow_data(&req.flow_data)?;
        principal.ensure_own_org(
            req.organization_id,
            Entity::Rule,
            "Cannot create rules outside your organization",
        )?;

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        if scoped_value_taken(&mut tx, "rules", "name", req.organization_id, &req.name, None)
            .await?
        {
            return Err(BillingError::duplicate(
                Entity::Rule,
                "Rule with this name already exists in this organization",
            ));
        }

        let now = now_epoch();
        let rule: Rule = sqlx::query_as(
            r#"
            INSERT INTO rules (
                id, name, description, trigger_type, organization_id,
                is_active, flow_data, created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.trigger_type.as_deref().unwrap_or("Manual"))
        .bind(req.organization_id)
        .bind(req.is_active.unwrap_or(false))
        .bind(&req.flow_data)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_violation(
            Entity::Rule,
            "Rule with this name already exists in this organization",
        ))?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(rule)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        req: UpdateRule,
    ) -> BillingResult<Rule> {
        if let Some(flow_data) = &req.flow_data {
            validate_flow_data(flow_data)?;
        }

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<Rule> = sqlx::query_as("SELECT * FROM rules WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let existing = match existing {
            Some(r) if r.organization_id == principal.organization_id => r,
            _ => {
                return Err(BillingError::forbidden(
                    Entity::Rule,
                    "Cannot update rules outside your organization or rule not found",
                ))
            }
        };

        if let Some(name) = &req.name {
            if *name != existing.name
                && scoped_value_taken(
                    &mut tx,
                    "rules",
                    "name",
                    existing.organization_id,
                    name,
                    Some(id),
                )
                .await?
            {
                return Err(BillingError::duplicate(
                    Entity::Rule,
                    "Rule with this name already exists in this organization",
                ));
            }
        }

        let now = now_epoch();
        let rule: Rule = sqlx::query_as(
            r#"
            UPDATE rules
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_active = COALESCE($4, is_active),
                flow_data = COALESCE($5, flow_data),
                updated_by = $6,
                updated_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.is_active)
        .bind(&req.flow_data)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_violation(
            Entity::Rule,
            "Rule with this name already exists in this organization",
        ))?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(rule)
    }

    /// Dedicated activation toggle; `is_active` is required here.
    pub async fn toggle(
        &self,
        principal: &Principal,
        id: Uuid,
        is_active: Option<bool>,
    ) -> BillingResult<Rule> {
        let is_active = is_active.ok_or_else(|| {
            BillingError::validation(Entity::Rule, "isActive field is required")
        })?;

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<Rule> = sqlx::query_as("SELECT * FROM rules WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        match existing {
            Some(r) if r.organization_id == principal.organization_id => {}
            _ => {
                return Err(BillingError::forbidden(
                    Entity::Rule,
                    "Cannot update rules outside your organization or rule not found",
                ))
            }
        }

        let now = now_epoch();
        let rule: Rule = sqlx::query_as(
            "UPDATE rules SET is_active = $2, updated_by = $3, updated_at = $4 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(is_active)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(rule)
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> BillingResult<()> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<Rule> = sqlx::query_as("SELECT * FROM rules WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        match existing {
            Some(r) if r.organization_id == principal.organization_id => {}
            _ => {
                return Err(BillingError::forbidden(
                    Entity::Rule,
                    "Cannot delete rules outside your organization or rule not found",
                ))
            }
        }

        // The execution log is immutable history; a rule that has run stays.
        let executions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM rule_executions WHERE rule_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        ensure_no_dependents(
            Entity::Rule,
            "Rule has recorded executions and cannot be deleted",
            &[("executions", executions)],
        )?;

        sqlx::query("DELETE FROM rules WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(BillingError::from)?;
        Ok(())
    }

    pub async fn list_executions(
        &self,
        principal: &Principal,
        params: &RuleExecutionListParams,
        limit: i64,
        offset: i64,
    ) -> BillingResult<(Vec<RuleExecution>, i64)> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut count_query = QueryBuilder::new(
            "SELECT COUNT(*) FROM rule_executions e JOIN rules r ON r.id = e.rule_id",
        );
        push_execution_filters(&mut count_query, principal.organization_id, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let mut query = QueryBuilder::new(
            "SELECT e.* FROM rule_executions e JOIN rules r ON r.id = e.rule_id",
        );
        push_execution_filters(&mut query, principal.organization_id, params);
        query.push(" ORDER BY e.executed_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let executions: Vec<RuleExecution> = query.build_query_as().fetch_all(&mut *tx).await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok((executions, total))
    }

    pub async fn get_execution(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> BillingResult<RuleExecution> {
        let execution: Option<RuleExecution> = sqlx::query_as(
            "SELECT e.* FROM rule_executions e \
             JOIN rules r ON r.id = e.rule_id \
             WHERE e.id = $1 AND r.organization_id = $2",
        )
        .bind(id)
        .bind(principal.organization_id)
        .fetch_optional(self.pool.pool())
        .await?;
        execution.ok_or_else(|| {
            BillingError::not_found(Entity::RuleExecution, "Rule execution not found")
        })
    }
}

fn push_rule_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    organization_id: Uuid,
    params: &RuleListParams,
) {
    query.push(" WHERE organization_id = ");
    query.push_bind(organization_id);

    if let Some(search) = &params.search {
        query.push(" AND name ILIKE ");
        query.push_bind(format!("%{}%", search));
    }
    if let Some(is_active) = params.is_active {
        query.push(" AND is_active = ");
        query.push_bind(is_active);
    }
}

fn push_execution_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    organization_id: Uuid,
    params: &RuleExecutionListParams,
) {
    query.push(" WHERE r.organization_id = ");
    query.push_bind(organization_id);

    if let Some(rule_id) = params.rule_id {
        query.push(" AND e.rule_id = ");
        query.push_bind(rule_id);
    }
    if let Some(claim_id) = params.claim_id {
        query.push(" AND e.claim_id = ");
        query.push_bind(claim_id);
    }
    if let Some(status) = &params.status {
        query.push(" AND e.status = ");
        query.push_bind(status.clone());
    }
    if let Some(date_from) = params.date_from {
        query.push(" AND e.executed_at >= ");
        query.push_bind(date_from);
    }
    if let Some(date_to) = params.date_to {
        query.push(" AND e.executed_at <= ");
        query.push_bind(date_to);
    }
}
