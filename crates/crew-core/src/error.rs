//! Unified error types for crew

use thiserror::Error;

/// Unified error type for all crew operations
#[derive(Error, Debug)]
pub enum CrewError {
    // Agent errors
    /// The execution runtime errored mid-sequence or produced no events.
    #[error("Agent '{role}' execution failed: {message}")]
    Execution { role: String, message: String },

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    // Pipeline errors
    /// A member of a concurrent stage failed.
    #[error("Stage '{stage}' failed at {role}: {source}")]
    Stage {
        stage: String,
        role: String,
        #[source]
        source: Box<CrewError>,
    },

    // Persistence errors
    #[error("Persistence failed: {0}")]
    Persistence(String),

    // Startup errors
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    // Runtime backends
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("API limit: {0}")]
    ApiLimit(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl CrewError {
    /// Build an execution failure for `role`
    pub fn execution(role: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            role: role.into(),
            message: message.into(),
        }
    }

    /// Wrap `self` as the failure of one member of a stage
    pub fn in_stage(self, stage: impl Into<String>, role: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            role: role.into(),
            source: Box::new(self),
        }
    }

    /// Role of the failing agent, for execution and stage failures
    pub fn role(&self) -> Option<&str> {
        match self {
            Self::Execution { role, .. } | Self::Stage { role, .. } => Some(role),
            _ => None,
        }
    }
}

/// Result type alias using CrewError
pub type Result<T> = std::result::Result<T, CrewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wraps_execution() {
        let err = CrewError::execution("architect", "stream closed").in_stage("design", "architect");

        assert_eq!(err.role(), Some("architect"));
        let text = err.to_string();
        assert!(text.contains("design"));
        assert!(text.contains("stream closed"));

        match err {
            CrewError::Stage { source, .. } => {
                assert!(matches!(*source, CrewError::Execution { .. }))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_role_absent_for_other_errors() {
        assert_eq!(CrewError::Persistence("x".into()).role(), None);
    }
}
