use super::render_context::base_bindings;
use super::{
    ActionArgs, ActionContext, ActionHandler, ActionOutcome, ContextSource, InjectContextArgs,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// `inject_context`: pull text from a previous session or a claimed handoff.
///
/// Produces `{inject_context: text}` only when there is something to inject;
/// every empty branch yields `None` and leaves the state untouched. It never
/// searches history for a parent and never claims a handoff itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectContextAction;

#[async_trait]
impl ActionHandler for InjectContextAction {
    fn parse_args(&self, raw: Value) -> crate::Result<ActionArgs> {
        ActionArgs::decode("inject_context", raw).map(ActionArgs::InjectContext)
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        args: ActionArgs,
    ) -> crate::Result<Option<ActionOutcome>> {
        let InjectContextArgs { source, template } = match args {
            ActionArgs::InjectContext(args) => args,
            other => return Err(other.mismatch("inject_context")),
        };

        let session = ctx.sessions.get(&ctx.session_id).await?;

        let (content, extra_key, extra_value) = match source {
            ContextSource::PreviousSessionSummary => {
                let Some(session) = session.as_ref() else {
                    debug!(session_id = %ctx.session_id, "Session not found");
                    return Ok(None);
                };
                let Some(parent_id) = session.parent_session_id.as_deref() else {
                    debug!(session_id = %ctx.session_id, "Session has no parent");
                    return Ok(None);
                };
                let summary = ctx
                    .sessions
                    .get(parent_id)
                    .await?
                    .and_then(|parent| parent.summary().map(str::to_string))
                    .unwrap_or_default();
                let value = Value::String(summary.clone());
                (summary, "summary", value)
            }
            ContextSource::Handoff => match ctx.handoffs.find_claimed_by(&ctx.session_id)? {
                Some(handoff) => (
                    handoff.injection_text(),
                    "handoff",
                    serde_json::to_value(&handoff)?,
                ),
                None => {
                    debug!(session_id = %ctx.session_id, "No claimed handoff");
                    (String::new(), "handoff", Value::Null)
                }
            },
        };

        if content.is_empty() {
            return Ok(None);
        }

        let content = match template {
            Some(template) => {
                let mut bindings = base_bindings(ctx, session.as_ref())?;
                bindings.insert(extra_key.to_string(), extra_value);
                ctx.templates.render(&template, &bindings)?
            }
            None => content,
        };

        if content.is_empty() {
            return Ok(None);
        }

        ctx.state.mark_context_injected();
        Ok(Some(ActionOutcome::InjectContext(content)))
    }
}
