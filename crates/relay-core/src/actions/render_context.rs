//! Template binding maps shared by the injection actions.

use super::ActionContext;
use crate::session::Session;
use serde_json::{Map, Value};

/// Bindings every template sees: `session`, `state` and `artifacts`.
///
/// `session` is `null` when the session cannot be resolved.
pub(crate) fn base_bindings(
    ctx: &ActionContext<'_>,
    session: Option<&Session>,
) -> crate::Result<Map<String, Value>> {
    let mut bindings = Map::new();
    bindings.insert("session".to_string(), serde_json::to_value(session)?);
    bindings.insert("state".to_string(), serde_json::to_value(&*ctx.state)?);
    bindings.insert(
        "artifacts".to_string(),
        serde_json::to_value(&ctx.state.artifacts)?,
    );
    Ok(bindings)
}

/// Bindings for `inject_message`: the base set plus `phase_action_count` and
/// `variables`, with caller-supplied `extra` keys winning on collision.
pub(crate) fn message_bindings(
    ctx: &ActionContext<'_>,
    session: Option<&Session>,
    extra: &Map<String, Value>,
) -> crate::Result<Map<String, Value>> {
    let mut bindings = base_bindings(ctx, session)?;
    bindings.insert(
        "phase_action_count".to_string(),
        Value::from(ctx.state.phase_action_count),
    );
    bindings.insert(
        "variables".to_string(),
        Value::Object(ctx.state.variables.clone()),
    );
    for (key, value) in extra {
        bindings.insert(key.clone(), value.clone());
    }
    Ok(bindings)
}
