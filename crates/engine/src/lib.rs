//! The deskclaw decision pipeline.
//!
//! Four pieces, wired together by the [`Orchestrator`]:
//! - [`EscalationClassifier`] — keyword cascade deciding when a human
//!   takes over
//! - [`FaqMatcher`] — two-stage FAQ lookup over the knowledge base
//! - [`ContextManager`] — per-session context with a TTL cache
//! - [`Orchestrator`] — the message state machine itself

pub mod context;
pub mod escalation;
pub mod faq;
pub mod orchestrator;

pub use context::{ContextManager, SessionContext, UserPreferences};
pub use escalation::{Decision, EscalationClassifier};
pub use faq::{FaqMatch, FaqMatcher};
pub use orchestrator::{Orchestrator, SessionEnd, SessionSummary};
