//! # cw-core
//!
//! Core data models and engines for Crosswatch.
//!
//! This crate provides the event envelope and its validator, the
//! investigation store, and the cross-tenant pattern correlator that
//! together form the heart of the central event router.

pub mod action;
pub mod correlator;
pub mod envelope;
pub mod store;
pub mod tenant;

pub use action::{ActionKind, DispatchEntry, DispatchOutcome};
pub use correlator::{
    CorrelationGroup, CorrelatorConfig, PatternCorrelator, PatternSignal,
};
pub use envelope::{
    validate, Envelope, EnvelopeDraft, InvestigationStatus, Severity, ValidationError,
};
pub use store::memory::MemoryStore;
pub use store::{
    CategoryEntry, InvestigationRecord, InvestigationStore, StoreError, UpsertOutcome,
};
pub use tenant::{InvestigationKey, TenantId};
