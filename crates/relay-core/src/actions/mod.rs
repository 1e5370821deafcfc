//! Workflow actions: the handler capability, argument union, outcomes and the
//! built-in handlers.
//!
//! A workflow driver picks an action name and a JSON argument map for each
//! phase step and hands them to [`Dispatcher::execute`]. The dispatcher always
//! answers with either an [`ActionOutcome`] or `None`; nothing a handler does
//! can make it return an error or unwind into the driver.

mod capture_artifact;
mod dispatcher;
mod generate_handoff;
mod inject_context;
mod inject_message;
mod registry;
mod render_context;

pub use capture_artifact::CaptureArtifactAction;
pub use dispatcher::Dispatcher;
pub use generate_handoff::GenerateHandoffAction;
pub use inject_context::InjectContextAction;
pub use inject_message::InjectMessageAction;
pub use registry::ActionRegistry;

use crate::handoff::HandoffManager;
use crate::session::SessionLookup;
use crate::template::TemplateEngine;
use crate::workflow::WorkflowState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Everything a handler may touch during one dispatch.
///
/// Built per dispatch (or per phase) for a single session and never shared
/// across sessions.
pub struct ActionContext<'a> {
    pub session_id: String,
    pub state: &'a mut WorkflowState,
    pub handoffs: &'a HandoffManager,
    pub sessions: &'a dyn SessionLookup,
    pub templates: &'a dyn TemplateEngine,
    /// Root for relative `capture_artifact` patterns.
    pub working_dir: PathBuf,
}

impl<'a> ActionContext<'a> {
    /// Build a context rooted at the process working directory.
    pub fn new(
        state: &'a mut WorkflowState,
        handoffs: &'a HandoffManager,
        sessions: &'a dyn SessionLookup,
        templates: &'a dyn TemplateEngine,
    ) -> Self {
        Self {
            session_id: state.session_id.clone(),
            state,
            handoffs,
            sessions,
            templates,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }
}

/// Where `inject_context` reads its content from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    /// Summary of the session's parent.
    PreviousSessionSummary,
    /// Handoff this session has already claimed.
    Handoff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectContextArgs {
    pub source: ContextSource,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectMessageArgs {
    pub content: String,
    /// Additional template bindings; they shadow the built-in ones.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureArtifactArgs {
    pub pattern: String,
    #[serde(rename = "as", default)]
    pub artifact_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateHandoffArgs {
    #[serde(default)]
    pub include: Vec<String>,
}

/// Validated arguments, one variant per built-in action.
///
/// Handlers registered by plugins receive their raw JSON as `Custom`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionArgs {
    InjectContext(InjectContextArgs),
    InjectMessage(InjectMessageArgs),
    CaptureArtifact(CaptureArtifactArgs),
    GenerateHandoff(GenerateHandoffArgs),
    Custom(Value),
}

impl ActionArgs {
    /// Decode a raw argument map into `T`, reporting failures as argument errors.
    pub fn decode<T: serde::de::DeserializeOwned>(action: &str, raw: Value) -> crate::Result<T> {
        serde_json::from_value(raw)
            .map_err(|e| crate::Error::argument(format!("{}: {}", action, e)))
    }

    fn kind(&self) -> &'static str {
        match self {
            ActionArgs::InjectContext(_) => "inject_context",
            ActionArgs::InjectMessage(_) => "inject_message",
            ActionArgs::CaptureArtifact(_) => "capture_artifact",
            ActionArgs::GenerateHandoff(_) => "generate_handoff",
            ActionArgs::Custom(_) => "custom",
        }
    }

    pub(crate) fn mismatch(&self, expected: &str) -> crate::Error {
        crate::Error::argument(format!(
            "{} received {} arguments",
            expected,
            self.kind()
        ))
    }
}

/// What a handler hands back to the driver.
///
/// Serializes to a single-key object, e.g. `{"inject_context": "..."}` or
/// `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    InjectContext(String),
    InjectMessage(String),
    /// Absolute path of the captured file.
    Captured(PathBuf),
    HandoffCreated(bool),
    /// The handler failed; the message describes why.
    Error(String),
    /// The arguments did not match what the action accepts.
    ArgumentError(String),
}

impl ActionOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ActionOutcome::Error(_) | ActionOutcome::ArgumentError(_))
    }
}

/// One named workflow action.
///
/// `Ok(None)` means the handler chose not to produce an effect (missing
/// session, nothing matched). Returning `Err` is reported to the driver as
/// [`ActionOutcome::Error`].
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Validate the raw argument map for this action.
    fn parse_args(&self, raw: Value) -> crate::Result<ActionArgs> {
        Ok(ActionArgs::Custom(raw))
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        args: ActionArgs,
    ) -> crate::Result<Option<ActionOutcome>>;
}
