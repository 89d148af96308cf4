//! MedLedger billing core.
//!
//! Multi-tenant medical-billing records: organizations own patients,
//! providers, payors, visits and claims. Every write is checked for tenant
//! scope, referential integrity and scoped uniqueness before it commits,
//! and every claim status change appends an audit entry to the claim's
//! timeline atomically with the mutation itself.
//!
//! The HTTP boundary lives in `medledger-server`; this crate only knows
//! about principals, transactions and records.

pub mod attachments;
pub mod claims;
pub mod cpt_codes;
pub mod error;
pub mod flow;
pub mod guard;
pub mod insurance_policies;
pub mod integrity;
pub mod models;
pub mod organizations;
pub mod patients;
pub mod payors;
pub mod principal;
pub mod providers;
pub mod rules;
pub mod time;
pub mod unique;
pub mod users;
pub mod visits;

pub use error::{BillingError, BillingResult};
pub use integrity::ValidationMode;
pub use principal::Principal;
