//! Simulation configuration.
//!
//! Settings for batch fan-out, stage retries, sampling temperatures, the
//! completion client and the audit log locations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::llm::DEFAULT_MODEL;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for simulation batches.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    // Fan-out settings
    /// Number of tasks launched per attribute.
    pub replicas_per_attribute: usize,
    /// Attempts allowed per stage before the task fails.
    pub max_attempts: usize,

    // LLM settings
    /// Model used for both stages.
    pub model: String,
    /// Sampling temperature of the persona stage.
    pub persona_temperature: f64,
    /// Sampling temperature of the decision stage.
    pub decision_temperature: f64,
    /// Timeout applied to every completion call.
    pub request_timeout: Duration,
    /// Cap on in-flight completion calls across all batches. Zero disables it.
    pub max_concurrent_requests: usize,

    // Storage settings
    /// Path of the simulation log.
    pub simulation_log_path: PathBuf,
    /// Path of the persona edit log.
    pub persona_edit_log_path: PathBuf,
    /// Optional YAML file overriding the built-in prompts.
    pub prompts_path: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            // Fan-out defaults
            replicas_per_attribute: 50,
            max_attempts: 10,

            // LLM defaults
            model: DEFAULT_MODEL.to_string(),
            persona_temperature: 0.7,
            decision_temperature: 0.2,
            request_timeout: Duration::from_secs(120),
            max_concurrent_requests: 64,

            // Storage defaults
            simulation_log_path: PathBuf::from("simulation_log.jsonl"),
            persona_edit_log_path: PathBuf::from("updated_personas.jsonl"),
            prompts_path: None,
        }
    }
}

impl SimulationConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PERSONA_FORGE_REPLICAS`: Tasks per attribute (default: 50)
    /// - `PERSONA_FORGE_MAX_ATTEMPTS`: Attempts per stage (default: 10)
    /// - `PERSONA_FORGE_MODEL`: Model name, falling back to `OPENAI_MODEL` (default: gpt-4o)
    /// - `PERSONA_FORGE_PERSONA_TEMPERATURE`: Persona stage temperature (default: 0.7)
    /// - `PERSONA_FORGE_DECISION_TEMPERATURE`: Decision stage temperature (default: 0.2)
    /// - `PERSONA_FORGE_REQUEST_TIMEOUT_SECS`: Per-call timeout in seconds (default: 120)
    /// - `PERSONA_FORGE_MAX_CONCURRENT_REQUESTS`: In-flight call cap, 0 for none (default: 64)
    /// - `PERSONA_FORGE_SIMULATION_LOG`: Simulation log path (default: simulation_log.jsonl)
    /// - `PERSONA_FORGE_PERSONA_EDIT_LOG`: Persona edit log path (default: updated_personas.jsonl)
    /// - `PERSONA_FORGE_PROMPTS`: YAML prompt file (default: built-in prompts)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the result
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Fan-out settings
        if let Some(val) = lookup("PERSONA_FORGE_REPLICAS") {
            config.replicas_per_attribute = parse_env_value(&val, "PERSONA_FORGE_REPLICAS")?;
        }

        if let Some(val) = lookup("PERSONA_FORGE_MAX_ATTEMPTS") {
            config.max_attempts = parse_env_value(&val, "PERSONA_FORGE_MAX_ATTEMPTS")?;
        }

        // LLM settings
        if let Some(val) = lookup("PERSONA_FORGE_MODEL").or_else(|| lookup("OPENAI_MODEL")) {
            config.model = val;
        }

        if let Some(val) = lookup("PERSONA_FORGE_PERSONA_TEMPERATURE") {
            config.persona_temperature =
                parse_env_value(&val, "PERSONA_FORGE_PERSONA_TEMPERATURE")?;
        }

        if let Some(val) = lookup("PERSONA_FORGE_DECISION_TEMPERATURE") {
            config.decision_temperature =
                parse_env_value(&val, "PERSONA_FORGE_DECISION_TEMPERATURE")?;
        }

        if let Some(val) = lookup("PERSONA_FORGE_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "PERSONA_FORGE_REQUEST_TIMEOUT_SECS")?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("PERSONA_FORGE_MAX_CONCURRENT_REQUESTS") {
            config.max_concurrent_requests =
                parse_env_value(&val, "PERSONA_FORGE_MAX_CONCURRENT_REQUESTS")?;
        }

        // Storage settings
        if let Some(val) = lookup("PERSONA_FORGE_SIMULATION_LOG") {
            config.simulation_log_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("PERSONA_FORGE_PERSONA_EDIT_LOG") {
            config.persona_edit_log_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("PERSONA_FORGE_PROMPTS") {
            config.prompts_path = Some(PathBuf::from(val));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replicas_per_attribute == 0 {
            return Err(ConfigError::ValidationFailed(
                "replicas_per_attribute must be greater than 0".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.persona_temperature) {
            return Err(ConfigError::ValidationFailed(
                "persona_temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.decision_temperature) {
            return Err(ConfigError::ValidationFailed(
                "decision_temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.simulation_log_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "simulation_log_path cannot be empty".to_string(),
            ));
        }

        if self.persona_edit_log_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "persona_edit_log_path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set tasks per attribute.
    pub fn with_replicas_per_attribute(mut self, replicas: usize) -> Self {
        self.replicas_per_attribute = replicas;
        self
    }

    /// Builder method to set attempts per stage.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Builder method to set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder method to set the persona stage temperature.
    pub fn with_persona_temperature(mut self, temp: f64) -> Self {
        self.persona_temperature = temp;
        self
    }

    /// Builder method to set the decision stage temperature.
    pub fn with_decision_temperature(mut self, temp: f64) -> Self {
        self.decision_temperature = temp;
        self
    }

    /// Builder method to set the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder method to set the in-flight call cap.
    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    /// Builder method to set the simulation log path.
    pub fn with_simulation_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.simulation_log_path = path.into();
        self
    }

    /// Builder method to set the persona edit log path.
    pub fn with_persona_edit_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persona_edit_log_path = path.into();
        self
    }

    /// Builder method to set the prompt file.
    pub fn with_prompts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.prompts_path = Some(path.into());
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
