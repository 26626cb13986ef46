//! Plain-text template rendering for prompts and tool confirmations.
//!
//! Templates use `{{ name }}` placeholders. Values are inserted verbatim: no
//! escaping is applied because the output is natural-language text.
use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior};

#[derive(Debug, thiserror::Error)]
#[error("Template error: {0}")]
pub struct TemplateError(#[from] minijinja::Error);

pub struct TemplateRenderer {
    environment: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut environment = Environment::new();
        // A placeholder without a value is a registration bug, not empty text.
        environment.set_undefined_behavior(UndefinedBehavior::Strict);
        environment.set_keep_trailing_newline(true);
        Self { environment }
    }

    pub fn render(
        &self,
        template: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<String, TemplateError> {
        Ok(self.environment.render_str(template, values)?)
    }

    /// Render once with sample values so broken templates fail at registration.
    pub fn check(
        &self,
        template: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), TemplateError> {
        self.render(template, values).map(|_| ())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer").finish_non_exhaustive()
    }
}
