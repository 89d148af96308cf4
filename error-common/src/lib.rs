//! Shared error vocabulary for MedLedger services.
//!
//! Every API error carries a machine-readable code of the form
//! `<ENTITY>_<REASON>` (e.g. `CLAIM_NOT_FOUND`, `PATIENT_VALIDATION_ERROR`).
//! This crate owns the entity tags and reason suffixes so the core and the
//! HTTP boundary render identical codes.

pub mod codes;
pub mod types;

pub use codes::{Entity, Reason};
pub use types::FieldError;
