//! Prompt templates for the persona and decision stages.
//!
//! Templates use Tera (Jinja2-style) syntax and declare the parameters they
//! need. Rendering checks the declared parameters before Tera sees the
//! source, so a missing key is reported by name instead of as a generic
//! render failure.
//!
//! # Example
//!
//! ```ignore
//! use persona_forge::template::{PromptParams, PromptSet};
//!
//! let prompts = PromptSet::load_file("prompts.yaml")?;
//! let text = prompts.persona.render(
//!     &PromptParams::new()
//!         .set("attribute", "retired nurse")
//!         .set("context", "their daily routine"),
//! )?;
//! ```

mod prompts;

pub use prompts::{DEFAULT_DECISION_PROMPT, DEFAULT_PERSONA_PROMPT};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tera::{Context, Tera};

use crate::error::TemplateError;

/// Named parameters for a template render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptParams {
    values: BTreeMap<String, String>,
}

impl PromptParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn to_context(&self) -> Context {
        let mut context = Context::new();
        for (key, value) in &self.values {
            context.insert(key.as_str(), value);
        }
        context
    }
}

/// A named prompt template with its required parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub required: Vec<String>,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            required: Vec::new(),
        }
    }

    /// Declares parameters that must be supplied to [`render`](Self::render).
    pub fn with_required<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Renders the template with `params`. Autoescaping is off: prompts are
    /// plain text, not HTML.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::MissingParameter` for the first required key
    /// absent from `params`, and `TemplateError::Render` if Tera rejects the
    /// source or references an undefined variable.
    pub fn render(&self, params: &PromptParams) -> Result<String, TemplateError> {
        if let Some(missing) = self.required.iter().find(|key| !params.contains(key)) {
            return Err(TemplateError::MissingParameter {
                template: self.name.clone(),
                parameter: missing.clone(),
            });
        }

        Tera::one_off(&self.source, &params.to_context(), false).map_err(|source| {
            TemplateError::Render {
                template: self.name.clone(),
                source,
            }
        })
    }
}

/// The two prompts a simulation task renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSet {
    pub persona: PromptTemplate,
    pub decision: PromptTemplate,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            persona: PromptTemplate::new("persona", DEFAULT_PERSONA_PROMPT)
                .with_required(["attribute", "context"]),
            decision: PromptTemplate::new("decision", DEFAULT_DECISION_PROMPT)
                .with_required(["name", "description", "scenario", "actionSpace"]),
        }
    }
}

impl PromptSet {
    /// Parses a prompt set from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, TemplateError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Loads a prompt set from a YAML file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| TemplateError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Serializes the prompt set to YAML.
    pub fn to_yaml(&self) -> Result<String, TemplateError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
