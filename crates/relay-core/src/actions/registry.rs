use super::{
    ActionHandler, CaptureArtifactAction, GenerateHandoffAction, InjectContextAction,
    InjectMessageAction,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name to handler table. The last registration for a name wins.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the four built-in actions.
    pub fn with_builtin_actions() -> Self {
        let mut registry = Self::new();
        registry.register("inject_context", Arc::new(InjectContextAction));
        registry.register("inject_message", Arc::new(InjectMessageAction));
        registry.register("capture_artifact", Arc::new(CaptureArtifactAction));
        registry.register("generate_handoff", Arc::new(GenerateHandoffAction));
        registry
    }

    /// Register `handler` under `name`, replacing any existing handler.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::debug!(action = %name, "Replaced action handler");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Registered action names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}
