//! # deskclaw Core
//!
//! Domain types, traits, and error definitions for the deskclaw customer
//! support bot. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator (durable stores, generation backends) is defined as a
//! trait here. Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod backend;
pub mod error;
pub mod escalation;
pub mod faq;
pub mod outcome;
pub mod relevance;
pub mod session;
pub mod store;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use backend::{Generated, GenerationBackend};
pub use error::{BackendError, Error, Result, StoreError};
pub use escalation::{
    Escalation, EscalationCategory, EscalationPriority, EscalationStats, EscalationStatus,
};
pub use faq::{FaqEntry, FaqPatch, NewFaq};
pub use outcome::{Outcome, OutcomeDetail, OutcomeKind};
pub use session::{Session, SessionId, SessionPatch};
pub use store::{EscalationStore, FaqStore, SessionStore, TurnStore};
pub use turn::{Role, Turn, TurnKind, TurnStats};
