// ABOUTME: Template engine implementation using Handlebars
// ABOUTME: Renders run task metadata and bodies against the shared context and decodes the YAML result

use handlebars::Handlebars;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use super::error::{Result, TemplateError};
use super::helpers;

#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    /// Create a lenient template engine with all built-in helpers
    pub fn new() -> Result<Self> {
        Self::with_strict_mode(false)
    }

    /// Create an engine where any unresolved reference fails the render
    pub fn strict() -> Result<Self> {
        Self::with_strict_mode(true)
    }

    pub fn with_strict_mode(strict: bool) -> Result<Self> {
        let mut handlebars = Handlebars::new();

        handlebars.set_strict_mode(strict);
        handlebars.set_dev_mode(false);

        // Rendered output is YAML and shell arguments, never HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        helpers::register_helpers(&mut handlebars)
            .map_err(|e| TemplateError::SystemError(e.to_string()))?;

        Ok(Self { handlebars })
    }

    pub fn is_strict(&self) -> bool {
        self.handlebars.strict_mode()
    }

    /// Render a template string with the given JSON context
    pub fn render_template(&self, template: &str, context: &JsonValue) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(TemplateError::from_render)
    }

    /// Render a template into YAML and decode it into `T`
    pub fn render_yaml<T: DeserializeOwned>(
        &self,
        template: &str,
        context: &JsonValue,
    ) -> Result<T> {
        let rendered = self.render_template(template, context)?;
        serde_yaml::from_str(&rendered).map_err(TemplateError::YamlError)
    }

    /// Render a YAML template and re-encode the document as JSON bytes
    pub fn render_yaml_as_json(&self, template: &str, context: &JsonValue) -> Result<Vec<u8>> {
        let document: JsonValue = self.render_yaml(template, context)?;
        serde_json::to_vec(&document).map_err(TemplateError::JsonError)
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        match handlebars::Template::compile(template) {
            Ok(_) => Ok(()),
            Err(e) => Err(TemplateError::SyntaxError(e.to_string())),
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new().expect("Failed to create default template engine")
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("strict", &self.is_strict())
            .finish()
    }
}
