//! Synthesis error types

use lampstack_core::StackError;
use thiserror::Error;

/// Errors raised while rendering a stack into a template
#[derive(Error, Debug)]
pub enum CloudError {
    #[error(transparent)]
    Stack(#[from] StackError),

    #[error("Invalid logical id '{0}': CloudFormation logical ids must be alphanumeric")]
    InvalidLogicalId(String),

    #[error("Duplicate logical id in template: {0}")]
    DuplicateLogicalId(String),

    #[error("Parameter '{0}' is defined twice with different settings")]
    ConflictingParameter(String),

    #[error("Circular dependency between resources: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
