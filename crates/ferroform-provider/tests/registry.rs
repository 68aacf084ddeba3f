use ferroform_core::schema::attr;
use ferroform_provider::handler::{UpdateProgress, incomplete_create};
use ferroform_provider::{InstanceState, ProviderError, Registry, ResourceAddr, ResourceKind};
use serde_json::{Value, json};

#[test]
fn resource_kinds_roundtrip_through_type_strings() {
    for kind in ResourceKind::ALL {
        assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        assert_eq!(kind.handler().type_name(), kind.as_str());
    }
}

#[test]
fn unknown_resource_type_is_rejected() {
    let registry = Registry::new();
    match registry.get("aws_kms_key") {
        Err(ProviderError::UnknownResourceType(t)) => assert_eq!(t, "aws_kms_key"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("aws_kms_key is not implemented"),
    }
}

#[test]
fn registry_lists_every_type() {
    let registry = Registry::new();
    let types: Vec<_> = registry.resource_types().collect();
    assert_eq!(
        types,
        vec![
            "aws_kms_replica_key",
            "aws_licensemanager_license_configuration",
            "aws_prometheus_workspace",
        ]
    );
}

#[test]
fn replica_key_schema_validates_before_any_call() {
    let registry = Registry::new();
    let schema = registry.get("aws_kms_replica_key").unwrap().schema();

    assert!(schema.validate(&json!({})).is_err());
    assert!(
        schema
            .validate(&json!({ "primary_key_arn": "arn:aws:s3:::bucket" }))
            .is_err()
    );
    assert!(
        schema
            .validate(&json!({
                "primary_key_arn": "arn:aws:kms:us-west-2:123456789012:key/mrk-1234",
                "deletion_window_in_days": 3,
            }))
            .is_err()
    );
    assert!(
        schema
            .validate(&json!({
                "primary_key_arn": "arn:aws:kms:us-west-2:123456789012:key/mrk-1234",
                "policy": "{not json",
            }))
            .is_err()
    );

    let mut attrs = schema
        .validate(&json!({
            "primary_key_arn": "arn:aws:kms:us-west-2:123456789012:key/mrk-1234",
        }))
        .unwrap();
    schema.apply_defaults(&mut attrs);
    assert_eq!(attrs["enabled"], json!(true));
    assert_eq!(attrs["deletion_window_in_days"], json!(30));
    assert_eq!(attrs["bypass_policy_lockout_safety_check"], json!(false));
    assert_eq!(attrs["description"], json!(""));
}

#[test]
fn license_configuration_schema_checks_counting_type_and_rules() {
    let registry = Registry::new();
    let schema = registry
        .get("aws_licensemanager_license_configuration")
        .unwrap()
        .schema();

    assert!(
        schema
            .validate(&json!({ "name": "x", "license_counting_type": "Seat" }))
            .is_err()
    );
    assert!(
        schema
            .validate(&json!({
                "name": "x",
                "license_counting_type": "Socket",
                "license_rules": ["minimumSockets=3"],
            }))
            .is_err()
    );
    assert!(
        schema
            .validate(&json!({
                "name": "x",
                "license_counting_type": "Socket",
                "license_count": -1,
            }))
            .is_err()
    );
    assert!(
        schema
            .validate(&json!({
                "name": "x",
                "license_counting_type": "Socket",
                "license_rules": ["#minimumSockets=3"],
            }))
            .is_ok()
    );
}

#[test]
fn workspace_alias_length_is_bounded() {
    let registry = Registry::new();
    let schema = registry.get("aws_prometheus_workspace").unwrap().schema();

    assert!(schema.validate(&json!({ "alias": "" })).is_err());
    assert!(schema.validate(&json!({ "alias": "a".repeat(101) })).is_err());
    assert!(schema.validate(&json!({ "alias": "metrics" })).is_ok());
    assert!(schema.validate(&json!({})).is_ok());
}

#[test]
fn resource_addr_parses_type_and_name() {
    let addr: ResourceAddr = "aws_kms_replica_key.test1".parse().unwrap();
    assert_eq!(addr.resource_type, "aws_kms_replica_key");
    assert_eq!(addr.resource_name, "test1");
    assert_eq!(addr.to_string(), "aws_kms_replica_key.test1");

    assert!("aws_kms_replica_key".parse::<ResourceAddr>().is_err());
    assert!(".test".parse::<ResourceAddr>().is_err());
}

fn prior() -> InstanceState {
    let mut attrs = serde_json::Map::new();
    attrs.insert(attr::DESCRIPTION.into(), json!("old"));
    attrs.insert(attr::ENABLED.into(), json!(true));
    attrs.insert(attr::POLICY.into(), json!("{}"));
    InstanceState::new("aws_kms_replica_key", "mrk-1", attrs)
}

#[test]
fn update_progress_without_progress_passes_error_through() {
    let prior = prior();
    let desired = serde_json::Map::new();
    let progress = UpdateProgress::new(&prior, &desired);

    let err = progress.fail(attr::DESCRIPTION, ProviderError::Fatal("boom".into()));
    assert!(matches!(err, ProviderError::Fatal(_)));
}

#[test]
fn update_progress_reports_partial_state() {
    let prior = prior();
    let mut desired = prior.attributes.clone();
    desired.insert(attr::DESCRIPTION.into(), json!("new"));
    desired.insert(attr::ENABLED.into(), json!(false));
    desired.insert(attr::POLICY.into(), json!(r#"{"Version":"2012-10-17"}"#));

    let mut progress = UpdateProgress::new(&prior, &desired);
    progress.applied(attr::DESCRIPTION);

    match progress.fail(attr::POLICY, ProviderError::Validation("malformed".into())) {
        ProviderError::PartialUpdate {
            applied,
            failed_attribute,
            state,
            ..
        } => {
            assert_eq!(applied, vec!["description".to_string()]);
            assert_eq!(failed_attribute, "policy");
            assert_eq!(state["description"], json!("new"));
            // Not applied: still the prior values.
            assert_eq!(state["enabled"], json!(true));
            assert_eq!(state["policy"], json!("{}"));
            assert_eq!(state["id"], Value::String("mrk-1".into()));
        }
        other => panic!("expected partial update, got {other:?}"),
    }
}

#[test]
fn incomplete_create_keeps_the_new_id() {
    let mut desired = serde_json::Map::new();
    desired.insert("alias".into(), json!("metrics"));
    let known = serde_json::Map::from_iter([("arn".to_string(), json!("arn:aws:aps:x"))]);
    let cause = ProviderError::Timeout {
        what: "workspace to become active".into(),
        seconds: 5,
    };

    let err = incomplete_create("aws_prometheus_workspace", "ws-1", &desired, known, cause);
    assert!(err.to_string().contains("ws-1"), "{err}");
    match err {
        ProviderError::IncompleteCreate { source, state } => {
            assert!(matches!(*source, ProviderError::Timeout { .. }));
            assert!(state.tainted);
            assert_eq!(state.id, "ws-1");
            assert_eq!(state.get_str("alias"), Some("metrics"));
            assert_eq!(state.get_str("arn"), Some("arn:aws:aps:x"));
        }
        other => panic!("expected incomplete create, got {other:?}"),
    }
}
