//! Workflow action dispatch and session handoff for relay.
//!
//! This crate drives AI-assisted work sessions through named workflow phases:
//! a driver dispatches named actions that read and mutate per-session
//! [`WorkflowState`], and finishing sessions publish [`Handoff`] records that a
//! successor claims exactly once.

pub mod actions;
pub mod db;
pub mod error;
pub mod handoff;
pub mod session;
pub mod template;
pub mod workflow;

/// Core result type used throughout relay.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type that encompasses all relay operations.
pub use error::Error;

/// Action dispatch and the built-in handlers.
pub use actions::{
    ActionArgs, ActionContext, ActionHandler, ActionOutcome, ActionRegistry, ContextSource,
    Dispatcher,
};

/// Database integration for persistence.
pub use db::DatabaseManager;

/// Handoff records and the claim protocol.
pub use handoff::{Handoff, HandoffDraft, HandoffManager};

/// Session lookup and status management.
pub use session::{Session, SessionLookup, SessionManager, SessionStatus};

/// Template rendering.
pub use template::{JinjaTemplateEngine, TemplateEngine};

/// Per-session workflow runtime state.
pub use workflow::WorkflowState;
