use aws_sdk_kms::error::{ProvideErrorMetadata, SdkError};
use serde_json::Value;
use thiserror::Error;

use crate::state::InstanceState;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote entity does not exist. Terminal; the orchestrator plans a
    /// recreate.
    #[error("resource not found: {resource_type}/{resource_id}")]
    NotFound {
        resource_type: String,
        resource_id: String,
    },

    /// Bad input, caught before any API call.
    #[error("validation error: {0}")]
    Validation(String),

    /// Network failure or throttling; retried with backoff.
    #[error("transient API error: {0}")]
    Transient(String),

    /// Resource busy or not yet propagated; retried a bounded number of times.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unexpected API error, surfaced verbatim.
    #[error("AWS error: {0}")]
    Fatal(String),

    #[error("timed out after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Some attribute calls of an update went through before one failed.
    /// `state` reflects only what was applied.
    #[error(
        "update of {failed_attribute} failed after applying [{}]: {source}",
        .applied.join(", ")
    )]
    PartialUpdate {
        applied: Vec<String>,
        failed_attribute: String,
        #[source]
        source: Box<ProviderError>,
        state: Box<Value>,
    },

    /// The create call went through but a later step failed. `state` is
    /// the tainted instance the orchestrator must record so it can be
    /// destroyed or replaced.
    #[error(
        "created {} {} but it did not become usable: {source}",
        .state.resource_type,
        .state.id
    )]
    IncompleteCreate {
        #[source]
        source: Box<ProviderError>,
        state: Box<InstanceState>,
    },

    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("invalid lifecycle transition: {0}")]
    Lifecycle(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("schema error: {0}")]
    Schema(#[from] ferroform_core::CoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn not_found(resource_type: &str, resource_id: &str) -> Self {
        Self::NotFound {
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Transient and conflict errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Conflict(_))
    }

    /// Prepend resource identity to the error message.
    pub fn with_resource(self, label: &str, name: &str) -> Self {
        match self {
            Self::Validation(msg) => Self::Validation(format!("{label} ({name}): {msg}")),
            Self::Transient(msg) => Self::Transient(format!("{label} ({name}): {msg}")),
            Self::Conflict(msg) => Self::Conflict(format!("{label} ({name}): {msg}")),
            Self::Fatal(msg) => Self::Fatal(format!("{label} ({name}): {msg}")),
            other => other,
        }
    }
}

/// Walk the full error chain and join all causes into one string.
///
/// AWS SDK errors often have terse `Display` impls (e.g. "service error")
/// but useful detail in the source chain.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Broad classes of remote failure, decided from the service error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Validation,
    Transient,
    Conflict,
    Fatal,
}

const NOT_FOUND_CODES: &[&str] = &["NotFoundException", "ResourceNotFoundException"];

const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "RateLimitExceededException",
    "ServiceUnavailable",
    "ServiceUnavailableException",
    "InternalFailure",
    "InternalServerException",
    "KMSInternalException",
    "DependencyTimeoutException",
    "ServerInternalException",
    "RequestTimeout",
    "RequestTimeoutException",
];

const CONFLICT_CODES: &[&str] = &[
    "ConflictException",
    "ConcurrentModificationException",
    "KMSInvalidStateException",
    "ResourceInUseException",
];

const VALIDATION_CODES: &[&str] = &[
    "ValidationException",
    "InvalidParameterValueException",
    "MalformedPolicyDocumentException",
    "InvalidArnException",
    "TagException",
];

/// Classify a service error from its code and message.
///
/// License Manager reports a missing configuration as an invalid parameter
/// rather than a not-found code, so the message is checked for that case.
pub fn classify(code: Option<&str>, message: &str) -> ErrorClass {
    let Some(code) = code else {
        return ErrorClass::Fatal;
    };
    if NOT_FOUND_CODES.contains(&code)
        || (code == "InvalidParameterValueException"
            && message.contains("Invalid license configuration ARN"))
    {
        ErrorClass::NotFound
    } else if TRANSIENT_CODES.contains(&code) {
        ErrorClass::Transient
    } else if CONFLICT_CODES.contains(&code) {
        ErrorClass::Conflict
    } else if VALIDATION_CODES.contains(&code) {
        ErrorClass::Validation
    } else {
        ErrorClass::Fatal
    }
}

/// Convert an SDK error into a classified [`ProviderError`].
///
/// Transport failures (dispatch, timeout, unparseable response) are
/// transient; service errors are classified by [`classify`]. The
/// `resource_type`/`resource_id` pair names the target for not-found errors.
pub fn from_sdk<E, R>(err: SdkError<E, R>, resource_type: &str, resource_id: &str) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let detail = format_err_chain(&err);
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ProviderError::Transient(detail)
        }
        _ => {
            let code = err.code().map(String::from);
            let message = err.message().unwrap_or_default().to_string();
            match classify(code.as_deref(), &message) {
                ErrorClass::NotFound => ProviderError::not_found(resource_type, resource_id),
                ErrorClass::Transient => ProviderError::Transient(detail),
                ErrorClass::Conflict => ProviderError::Conflict(detail),
                ErrorClass::Validation => ProviderError::Validation(detail),
                ErrorClass::Fatal => ProviderError::Fatal(detail),
            }
        }
    }
}
