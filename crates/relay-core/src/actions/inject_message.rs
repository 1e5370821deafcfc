use super::render_context::message_bindings;
use super::{ActionArgs, ActionContext, ActionHandler, ActionOutcome, InjectMessageArgs};
use async_trait::async_trait;
use serde_json::Value;

/// `inject_message`: render `content` and always return it.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectMessageAction;

#[async_trait]
impl ActionHandler for InjectMessageAction {
    fn parse_args(&self, raw: Value) -> crate::Result<ActionArgs> {
        ActionArgs::decode("inject_message", raw).map(ActionArgs::InjectMessage)
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        args: ActionArgs,
    ) -> crate::Result<Option<ActionOutcome>> {
        let InjectMessageArgs { content, extra } = match args {
            ActionArgs::InjectMessage(args) => args,
            other => return Err(other.mismatch("inject_message")),
        };

        let session = ctx.sessions.get(&ctx.session_id).await?;
        let bindings = message_bindings(ctx, session.as_ref(), &extra)?;
        let rendered = ctx.templates.render(&content, &bindings)?;

        Ok(Some(ActionOutcome::InjectMessage(rendered)))
    }
}
