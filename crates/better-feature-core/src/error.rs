// Error types shared by every better-feature crate.
//
// One enum covers boot-time failures (configuration, plugin init) and
// call-site failures (validation, missing models, database errors).

/// Remediation hint attached to [`FeatureError::ModelNotFound`].
pub const GENERATE_SCHEMA_HINT: &str =
    "Run `npx @better-feature/cli generate` to generate the schema for your models.";

/// Internal error type for better-feature operations.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// No resolvable adapter, unparsable base URL, bad option values.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed where clause or a missing required field on write.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Model \"{model}\" not found. {hint}")]
    ModelNotFound { model: String, hint: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Plugin \"{id}\" failed: {message}")]
    Plugin { id: String, message: String },

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl FeatureError {
    /// Build a [`FeatureError::ModelNotFound`] carrying the generation hint.
    pub fn model_not_found(model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            model: model.into(),
            hint: GENERATE_SCHEMA_HINT.to_string(),
        }
    }

    pub fn plugin(id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Plugin {
            id: id.into(),
            message: message.to_string(),
        }
    }

    /// Errors that abort construction of a feature instance.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Plugin { .. } | Self::ModelNotFound { .. }
        )
    }
}

/// Unified result type for better-feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found_message_names_model_and_hint() {
        let err = FeatureError::model_not_found("tester");
        let msg = err.to_string();
        assert!(msg.contains("\"tester\""));
        assert!(msg.contains("generate"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_validation_is_not_fatal() {
        let err = FeatureError::Validation("bad".into());
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Validation error: bad");
    }

    #[test]
    fn test_plugin_error_display() {
        let err = FeatureError::plugin("tester", "boom");
        assert_eq!(err.to_string(), "Plugin \"tester\" failed: boom");
    }
}
