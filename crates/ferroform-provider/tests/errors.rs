use ferroform_provider::error::{ErrorClass, classify, format_err_chain};
use ferroform_provider::ProviderError;
use serde_json::json;

#[test]
fn classifies_service_codes() {
    assert_eq!(classify(Some("NotFoundException"), ""), ErrorClass::NotFound);
    assert_eq!(classify(Some("ResourceNotFoundException"), ""), ErrorClass::NotFound);
    assert_eq!(classify(Some("ThrottlingException"), ""), ErrorClass::Transient);
    assert_eq!(classify(Some("KMSInternalException"), ""), ErrorClass::Transient);
    assert_eq!(classify(Some("ConflictException"), ""), ErrorClass::Conflict);
    assert_eq!(classify(Some("KMSInvalidStateException"), ""), ErrorClass::Conflict);
    assert_eq!(classify(Some("ValidationException"), ""), ErrorClass::Validation);
    assert_eq!(classify(Some("AccessDeniedException"), ""), ErrorClass::Fatal);
    assert_eq!(classify(None, "something broke"), ErrorClass::Fatal);
}

#[test]
fn license_manager_invalid_arn_is_not_found() {
    assert_eq!(
        classify(
            Some("InvalidParameterValueException"),
            "Invalid license configuration ARN: arn:aws:license-manager:us-west-2:123456789012:license-configuration:lic-0"
        ),
        ErrorClass::NotFound
    );
    assert_eq!(
        classify(Some("InvalidParameterValueException"), "License count must be positive"),
        ErrorClass::Validation
    );
}

#[test]
fn daily_limit_is_not_retried() {
    assert_eq!(
        classify(
            Some("ResourceLimitExceededException"),
            "You have reached the maximum allowed number of license configurations created in one day"
        ),
        ErrorClass::Fatal
    );
}

#[test]
fn only_transient_and_conflict_are_retryable() {
    assert!(ProviderError::Transient("slow down".into()).is_retryable());
    assert!(ProviderError::Conflict("busy".into()).is_retryable());
    assert!(!ProviderError::Validation("bad".into()).is_retryable());
    assert!(!ProviderError::Fatal("boom".into()).is_retryable());
    assert!(!ProviderError::not_found("aws_kms_replica_key", "mrk-1").is_retryable());
}

#[test]
fn with_resource_prefixes_message() {
    let err = ProviderError::Fatal("AccessDenied".into())
        .with_resource("aws_kms_replica_key", "mrk-1");
    assert_eq!(err.to_string(), "AWS error: aws_kms_replica_key (mrk-1): AccessDenied");

    let err = ProviderError::not_found("aws_kms_replica_key", "mrk-1").with_resource("x", "y");
    assert!(err.is_not_found());
}

#[test]
fn partial_update_reports_applied_attributes() {
    let err = ProviderError::PartialUpdate {
        applied: vec!["description".into(), "enabled".into()],
        failed_attribute: "policy".into(),
        source: Box::new(ProviderError::Fatal("MalformedPolicyDocument".into())),
        state: Box::new(json!({ "description": "new" })),
    };
    let msg = err.to_string();
    assert!(msg.contains("update of policy failed"), "{msg}");
    assert!(msg.contains("[description, enabled]"), "{msg}");

    let chain = format_err_chain(&err);
    assert!(chain.ends_with("AWS error: MalformedPolicyDocument"), "{chain}");
}
