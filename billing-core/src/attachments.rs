//! Attachment metadata. The blob itself lives in an external file store;
//! this module owns the rows and validates the owning claim/patient the
//! same way as any other foreign reference.

use crate::error::{BillingError, BillingResult};
use crate::integrity::{ReferenceCheck, ReferenceValidator};
use crate::models::Attachment;
use crate::principal::Principal;
use crate::time::now_epoch;
use database_layer::{DatabasePool, TransactionManager};
use error_common::Entity;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug)]
pub struct NewAttachment {
    pub claim_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachmentListParams {
    pub claim_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub file_type: Option<String>,
}

pub struct AttachmentService {
    pool: DatabasePool,
    validator: ReferenceValidator,
}

impl AttachmentService {
    pub fn new(pool: DatabasePool, validator: ReferenceValidator) -> Self {
        Self { pool, validator }
    }

    fn manager(&self, principal: &Principal) -> TransactionManager {
        TransactionManager::new(self.pool.clone()).with_scope(principal.scope())
    }

    pub async fn list(
        &self,
        principal: &Principal,
        params: &AttachmentListParams,
        limit: i64,
        offset: i64,
    ) -> BillingResult<(Vec<Attachment>, i64)> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM attachments a");
        push_attachment_filters(&mut count_query, principal.organization_id, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let mut query = QueryBuilder::new("SELECT a.* FROM attachments a");
        push_attachment_filters(&mut query, principal.organization_id, params);
        query.push(" ORDER BY a.uploaded_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let attachments: Vec<Attachment> = query.build_query_as().fetch_all(&mut *tx).await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok((attachments, total))
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> BillingResult<Attachment> {
        let attachment: Option<Attachment> = sqlx::query_as(
            "SELECT a.* FROM attachments a \
             WHERE a.id = $1 AND (\
                 EXISTS(SELECT 1 FROM claims c WHERE c.id = a.claim_id AND c.organization_id = $2) \
                 OR EXISTS(SELECT 1 FROM patients p WHERE p.id = a.patient_id AND p.organization_id = $2))",
        )
        .bind(id)
        .bind(principal.organization_id)
        .fetch_optional(self.pool.pool())
        .await?;
        attachment
            .ok_or_else(|| BillingError::not_found(Entity::Attachment, "Attachment not found"))
    }

    /// Persist metadata for a blob the boundary has already stored.
    pub async fn create(
        &self,
        principal: &Principal,
        req: NewAttachment,
    ) -> BillingResult<Attachment> {
        if req.claim_id.is_none() && req.patient_id.is_none() {
            return Err(BillingError::validation(
                Entity::Attachment,
                "Either claimId or patientId must be provided",
            ));
        }

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut checks = Vec::new();
        if let Some(claim_id) = req.claim_id {
            checks.push(ReferenceCheck::new(Entity::Claim, "claimId", claim_id));
        }
        if let Some(patient_id) = req.patient_id {
            checks.push(ReferenceCheck::new(Entity::Patient, "patientId", patient_id));
        }
        self.validator
            .validate(&mut tx, principal.organization_id, &checks)
            .await?;

        let now = now_epoch();
        let attachment: Attachment = sqlx::query_as(
            r#"
            INSERT INTO attachments (
                id, claim_id, patient_id, file_name, file_type, file_size,
                file_path, uploaded_by, uploaded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.claim_id)
        .bind(req.patient_id)
        .bind(&req.file_name)
        .bind(&req.file_type)
        .bind(req.file_size)
        .bind(&req.file_path)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(attachment)
    }

    /// Remove the metadata row; returns it so the boundary can delete the
    /// blob after the transaction commits.
    pub async fn delete(&self, principal: &Principal, id: Uuid) -> BillingResult<Attachment> {
        let attachment = self.get(principal, id).await?;

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;
        sqlx::query("DELETE FROM attachments WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(BillingError::from)?;
        Ok(attachment)
    }
}

fn push_attachment_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    organization_id: Uuid,
    params: &AttachmentListParams,
) {
    query.push(
        " WHERE (\
          EXISTS(SELECT 1 FROM claims c WHERE c.id = a.claim_id AND c.organization_id = ",
    );
    query.push_bind(organization_id);
    query.push(
        ") OR EXISTS(SELECT 1 FROM patients p WHERE p.id = a.patient_id AND p.organization_id = ",
    );
    query.push_bind(organization_id);
    query.push("))");

    if let Some(claim_id) = params.claim_id {
        query.push(" AND a.claim_id = ");
        query.push_bind(claim_id);
    }
    if let Some(patient_id) = params.patient_id {
        query.push(" AND a.patient_id = ");
        query.push_bind(patient_id);
    }
    if let Some(file_type) = &params.file_type {
        query.push(" AND a.file_type = ");
        query.push_bind(file_type.clone());
    }
}
