//! Structured record extraction from LLM responses.
//!
//! Models are asked to answer with a bare JSON object but frequently wrap it
//! in a markdown fence. Extraction runs in three steps:
//!
//! 1. Trim the text and drop a leading fence line (```` ``` ```` or
//!    ```` ```json ````) and a trailing closing fence line.
//! 2. Parse the remainder as a JSON object ([`ExtractionError::Malformed`]
//!    otherwise).
//! 3. Check every field of a [`RecordSchema`] is present and accepted by its
//!    validator ([`ExtractionError::InvalidFields`] otherwise).
//!
//! # Example
//!
//! ```
//! use persona_forge::utils::json_extraction::{extract_record, non_empty_string, RecordSchema};
//!
//! let schema = RecordSchema::new()
//!     .field("name", non_empty_string)
//!     .field("description", non_empty_string);
//!
//! let raw = "```json\n{\"name\": \"Maya\", \"description\": \"A nurse\"}\n```";
//! let record = extract_record(raw, &schema).unwrap();
//! assert_eq!(record["name"], "Maya");
//! ```

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Markdown code fence marker.
pub const FENCE: &str = "```";

/// Maximum number of characters of the offending text kept in an error.
const PREVIEW_CHARS: usize = 120;

/// Error type for record extraction failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// The text is not a JSON object.
    #[error("malformed: {reason} (content starts with '{preview}')")]
    Malformed { reason: String, preview: String },

    /// The object is missing required fields or a validator rejected them.
    #[error("invalid-fields: {}", .fields.join(", "))]
    InvalidFields { fields: Vec<String> },
}

impl ExtractionError {
    /// Short classification used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::Malformed { .. } => "malformed",
            ExtractionError::InvalidFields { .. } => "invalid-fields",
        }
    }

    fn malformed(reason: impl Into<String>, content: &str) -> Self {
        ExtractionError::Malformed {
            reason: reason.into(),
            preview: content.chars().take(PREVIEW_CHARS).collect(),
        }
    }
}

/// Predicate applied to a field value.
pub type FieldValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// The fields a record must carry, each with its validator.
#[derive(Clone, Default)]
pub struct RecordSchema {
    fields: Vec<(String, FieldValidator)>,
}

impl fmt::Debug for RecordSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema")
            .field("fields", &self.field_names().collect::<Vec<_>>())
            .finish()
    }
}

impl RecordSchema {
    /// Creates an empty schema that accepts any JSON object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a required field checked by `validator`.
    pub fn field<F>(mut self, name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.fields.push((name.into(), Arc::new(validator)));
        self
    }

    /// Adds a required field that only has to be present.
    pub fn required(self, name: impl Into<String>) -> Self {
        self.field(name, |_| true)
    }

    /// Names of the required fields, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the names of fields that are missing or rejected.
    fn violations(&self, record: &Map<String, Value>) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(name, validator)| !record.get(name).is_some_and(|v| validator(v)))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Accepts strings with at least one non-whitespace character.
pub fn non_empty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.trim().is_empty())
}

/// Accepts any string, including the empty string.
pub fn is_string(value: &Value) -> bool {
    value.is_string()
}

/// Removes a leading fence line and a trailing closing fence line.
///
/// Text without fences is returned trimmed and otherwise unchanged.
pub fn strip_code_fences(text: &str) -> String {
    let mut lines: Vec<&str> = text.trim().lines().collect();

    if lines.first().is_some_and(|l| l.trim().starts_with(FENCE)) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim() == FENCE) {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}

/// Extracts and validates a JSON object from raw model output.
///
/// # Errors
///
/// Returns `ExtractionError::Malformed` if the stripped text is not a JSON
/// object, and `ExtractionError::InvalidFields` if any schema field is missing
/// or fails its validator.
pub fn extract_record(
    raw: &str,
    schema: &RecordSchema,
) -> Result<Map<String, Value>, ExtractionError> {
    let stripped = strip_code_fences(raw);

    let value: Value = serde_json::from_str(&stripped)
        .map_err(|e| ExtractionError::malformed(e.to_string(), &stripped))?;

    let Value::Object(record) = value else {
        return Err(ExtractionError::malformed(
            "top-level value is not an object",
            &stripped,
        ));
    };

    let violations = schema.violations(&record);
    if !violations.is_empty() {
        return Err(ExtractionError::InvalidFields { fields: violations });
    }

    Ok(record)
}

/// Extracts a record and deserializes it into `T`.
///
/// The schema is checked first so field-level problems are reported as
/// `InvalidFields`; a type mismatch the schema did not cover is `Malformed`.
pub fn extract_as<T: DeserializeOwned>(
    raw: &str,
    schema: &RecordSchema,
) -> Result<T, ExtractionError> {
    let record = extract_record(raw, schema)?;
    let value = Value::Object(record);
    let preview = value.to_string();
    serde_json::from_value(value).map_err(|e| ExtractionError::malformed(e.to_string(), &preview))
}
