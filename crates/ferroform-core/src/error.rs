use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid ARN {arn:?}: {reason}")]
    InvalidArn { arn: String, reason: String },

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("unsupported attribute: {0}")]
    UnknownAttribute(String),

    #[error("attribute {name} must be {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("attribute {0} is computed and cannot be set")]
    ComputedAttribute(String),

    #[error("configuration must be an object, got {0}")]
    NotAnObject(String),
}
