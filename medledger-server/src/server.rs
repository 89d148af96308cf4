use billing_core::attachments::AttachmentService;
use billing_core::claims::ClaimLifecycle;
use billing_core::cpt_codes::CptCodeService;
use billing_core::insurance_policies::InsurancePolicyService;
use billing_core::integrity::ReferenceValidator;
use billing_core::organizations::OrganizationService;
use billing_core::patients::PatientService;
use billing_core::payors::PayorService;
use billing_core::providers::ProviderService;
use billing_core::rules::RuleService;
use billing_core::users::UserService;
use billing_core::visits::VisitService;
use billing_core::ValidationMode;
use database_layer::DatabasePool;
use std::path::PathBuf;
use std::sync::Arc;

use crate::storage::{FileStore, LocalFileStore};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How the referential-integrity validator reports failures.
    pub validation_mode: ValidationMode,
    /// Root directory of the local attachment store.
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            validation_mode: ValidationMode::FailFast,
            upload_dir: PathBuf::from("./uploads"),
        }
    }
}

/// Shared application state: one service per entity, all over the same pool.
#[derive(Clone)]
pub struct MedLedgerServer {
    db: DatabasePool,
    storage: Arc<dyn FileStore>,
    services: Arc<Services>,
}

struct Services {
    organizations: OrganizationService,
    users: UserService,
    patients: PatientService,
    providers: ProviderService,
    payors: PayorService,
    insurance_policies: InsurancePolicyService,
    cpt_codes: CptCodeService,
    visits: VisitService,
    claims: ClaimLifecycle,
    rules: RuleService,
    attachments: AttachmentService,
}

impl MedLedgerServer {
    pub fn new(db: DatabasePool, config: ServerConfig) -> Self {
        let validator = ReferenceValidator::new(config.validation_mode);
        let services = Services {
            organizations: OrganizationService::new(db.clone()),
            users: UserService::new(db.clone(), validator),
            patients: PatientService::new(db.clone(), validator),
            providers: ProviderService::new(db.clone(), validator),
            payors: PayorService::new(db.clone(), validator),
            insurance_policies: InsurancePolicyService::new(db.clone()),
            cpt_codes: CptCodeService::new(db.clone()),
            visits: VisitService::new(db.clone(), validator),
            claims: ClaimLifecycle::new(db.clone(), validator),
            rules: RuleService::new(db.clone()),
            attachments: AttachmentService::new(db.clone(), validator),
        };
        Self {
            db,
            storage: Arc::new(LocalFileStore::new(&config.upload_dir)),
            services: Arc::new(services),
        }
    }

    pub fn db(&self) -> &DatabasePool {
        &self.db
    }

    pub fn storage(&self) -> &dyn FileStore {
        self.storage.as_ref()
    }

    pub fn organizations(&self) -> &OrganizationService {
        &self.services.organizations
    }

    pub fn users(&self) -> &UserService {
        &self.services.users
    }

    pub fn patients(&self) -> &PatientService {
        &self.services.patients
    }

    pub fn providers(&self) -> &ProviderService {
        &self.services.providers
    }

    pub fn payors(&self) -> &PayorService {
        &self.services.payors
    }

    pub fn insurance_policies(&self) -> &InsurancePolicyService {
        &self.services.insurance_policies
    }

    pub fn cpt_codes(&self) -> &CptCodeService {
        &self.services.cpt_codes
    }

    pub fn visits(&self) -> &VisitService {
        &self.services.visits
    }

    pub fn claims(&self) -> &ClaimLifecycle {
        &self.services.claims
    }

    pub fn rules(&self) -> &RuleService {
        &self.services.rules
    }

    pub fn attachments(&self) -> &AttachmentService {
        &self.services.attachments
    }
}
