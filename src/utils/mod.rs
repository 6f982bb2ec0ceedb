//! Shared utility functions for persona-forge.
//!
//! Currently this is the structured extraction of JSON records from LLM
//! responses.

pub mod json_extraction;

pub use json_extraction::{
    extract_as, extract_record, is_string, non_empty_string, strip_code_fences, ExtractionError,
    FieldValidator, RecordSchema,
};
