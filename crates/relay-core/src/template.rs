//! Template rendering for injected context and messages.

use minijinja::{Environment, UndefinedBehavior};
use serde_json::{Map, Value};

/// Renders a template string against a name-to-value binding map.
///
/// Implementations must ignore bindings the template does not reference and
/// must fail (never substitute an empty string) when the template references a
/// name that is not bound.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, context: &Map<String, Value>) -> crate::Result<String>;
}

/// Jinja-syntax engine backed by minijinja in strict-undefined mode.
#[derive(Debug)]
pub struct JinjaTemplateEngine {
    env: Environment<'static>,
}

impl JinjaTemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        Self { env }
    }
}

impl Default for JinjaTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for JinjaTemplateEngine {
    fn render(&self, template: &str, context: &Map<String, Value>) -> crate::Result<String> {
        Ok(self.env.render_str(template, context)?)
    }
}
