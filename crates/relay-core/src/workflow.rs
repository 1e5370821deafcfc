//! Per-session workflow runtime state.

use chrono::{DateTime, Utc};
use relay_local_db::WorkflowStateRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Mutable state of one session's run through a workflow.
///
/// Exactly one dispatch sequence writes to a given state at a time; handlers
/// receive it as `&mut` for the duration of a single call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub session_id: String,
    pub workflow_name: String,
    pub phase: String,
    /// Actions dispatched in the current phase. Reset only by `transition_to`.
    pub phase_action_count: u32,
    /// Set once any context was injected; never cleared.
    pub context_injected: bool,
    /// Captured artifact name to absolute path.
    pub artifacts: BTreeMap<String, String>,
    pub variables: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(
        session_id: impl Into<String>,
        workflow_name: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            workflow_name: workflow_name.into(),
            phase: phase.into(),
            phase_action_count: 0,
            context_injected: false,
            artifacts: BTreeMap::new(),
            variables: Map::new(),
            updated_at: Utc::now(),
        }
    }

    /// Count one more action in the current phase.
    pub fn record_action(&mut self) {
        self.phase_action_count = self.phase_action_count.saturating_add(1);
        self.touch();
    }

    /// Move to another phase and restart the per-phase action counter.
    pub fn transition_to(&mut self, phase: impl Into<String>) {
        self.phase = phase.into();
        self.phase_action_count = 0;
        self.touch();
    }

    pub fn mark_context_injected(&mut self) {
        self.context_injected = true;
        self.touch();
    }

    /// Insert or replace a named artifact.
    pub fn set_artifact(&mut self, name: impl Into<String>, path: impl Into<String>) {
        self.artifacts.insert(name.into(), path.into());
        self.touch();
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub(crate) fn to_record(&self) -> crate::Result<WorkflowStateRecord> {
        Ok(WorkflowStateRecord {
            session_id: self.session_id.clone(),
            workflow_name: self.workflow_name.clone(),
            phase: self.phase.clone(),
            phase_action_count: i64::from(self.phase_action_count),
            context_injected: self.context_injected,
            artifacts: serde_json::to_string(&self.artifacts)?,
            variables: serde_json::to_string(&self.variables)?,
            updated_at: self.updated_at.to_rfc3339(),
        })
    }

    pub(crate) fn from_record(record: WorkflowStateRecord) -> crate::Result<Self> {
        let phase_action_count = u32::try_from(record.phase_action_count).map_err(|_| {
            crate::Error::generic(format!(
                "Invalid phase_action_count {} for session {}",
                record.phase_action_count, record.session_id
            ))
        })?;

        Ok(Self {
            phase_action_count,
            context_injected: record.context_injected,
            artifacts: serde_json::from_str(&record.artifacts)?,
            variables: serde_json::from_str(&record.variables)?,
            updated_at: crate::session::parse_timestamp(&record.updated_at, "updated_at")?,
            session_id: record.session_id,
            workflow_name: record.workflow_name,
            phase: record.phase,
        })
    }
}
