use super::{ActionArgs, ActionContext, ActionHandler, ActionOutcome, GenerateHandoffArgs};
use crate::handoff::{HandoffDraft, DEFAULT_HANDOFF_NOTES};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// `generate_handoff`: publish an open handoff for this session.
///
/// `include: ["artifacts"]` copies the captured artifacts into the record.
/// Pending tasks stay empty until a task source is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateHandoffAction;

#[async_trait]
impl ActionHandler for GenerateHandoffAction {
    fn parse_args(&self, raw: Value) -> crate::Result<ActionArgs> {
        ActionArgs::decode("generate_handoff", raw).map(ActionArgs::GenerateHandoff)
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        args: ActionArgs,
    ) -> crate::Result<Option<ActionOutcome>> {
        let GenerateHandoffArgs { include } = match args {
            ActionArgs::GenerateHandoff(args) => args,
            other => return Err(other.mismatch("generate_handoff")),
        };

        let Some(session) = ctx.sessions.get(&ctx.session_id).await? else {
            debug!(session_id = %ctx.session_id, "Session not found");
            return Ok(None);
        };

        let artifacts = if include.iter().any(|item| item == "artifacts") {
            ctx.state.artifacts.clone()
        } else {
            BTreeMap::new()
        };

        let draft = HandoffDraft {
            project_id: session.project_id,
            workflow_name: ctx.state.workflow_name.clone(),
            from_session_id: ctx.session_id.clone(),
            phase: ctx.state.phase.clone(),
            artifacts,
            pending_tasks: Vec::new(),
            notes: Some(DEFAULT_HANDOFF_NOTES.to_string()),
        };
        ctx.sessions.publish_handoff(ctx.handoffs, &draft).await?;

        Ok(Some(ActionOutcome::HandoffCreated(true)))
    }
}
