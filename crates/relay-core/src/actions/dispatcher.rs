use super::{ActionContext, ActionHandler, ActionOutcome, ActionRegistry};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Resolves action names and runs handlers behind a failure boundary.
///
/// `execute` returns `None` for unknown actions and for handlers that decline
/// to act, and converts handler errors and panics into
/// [`ActionOutcome::Error`]. It never reorders or batches calls; the driver
/// must not run two dispatches for the same session at once.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    registry: ActionRegistry,
}

impl Dispatcher {
    pub fn new(registry: ActionRegistry) -> Self {
        Self { registry }
    }

    /// A dispatcher preloaded with the built-in actions.
    pub fn with_builtin_actions() -> Self {
        Self::new(ActionRegistry::with_builtin_actions())
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.registry.register(name, handler);
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Run the action `name` against `ctx` with the raw argument map `args`.
    pub async fn execute(
        &self,
        name: &str,
        ctx: &mut ActionContext<'_>,
        args: Value,
    ) -> Option<ActionOutcome> {
        let Some(handler) = self.registry.get(name) else {
            warn!(action = name, session_id = %ctx.session_id, "Unknown action type");
            return None;
        };

        let raw = match args {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let args = match handler.parse_args(raw) {
            Ok(args) => args,
            Err(e) => {
                warn!(action = name, session_id = %ctx.session_id, error = %e, "Rejected action arguments");
                return Some(ActionOutcome::ArgumentError(e.to_string()));
            }
        };

        ctx.state.record_action();
        debug!(
            action = name,
            session_id = %ctx.session_id,
            phase = %ctx.state.phase,
            phase_action_count = ctx.state.phase_action_count,
            "Dispatching action"
        );

        let result = AssertUnwindSafe(handler.execute(ctx, args))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(
                    action = name,
                    session_id = %ctx.session_id,
                    workflow = %ctx.state.workflow_name,
                    phase = %ctx.state.phase,
                    error = ?e,
                    "Error executing action"
                );
                Some(ActionOutcome::Error(e.to_string()))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    action = name,
                    session_id = %ctx.session_id,
                    workflow = %ctx.state.workflow_name,
                    phase = %ctx.state.phase,
                    panic = %message,
                    "Action handler panicked"
                );
                Some(ActionOutcome::Error(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("action panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("action panicked: {}", message)
    } else {
        "action panicked".to_string()
    }
}
