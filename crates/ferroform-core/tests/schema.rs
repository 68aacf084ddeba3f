use ferroform_core::CoreError;
use ferroform_core::schema::{AttrType, Attribute, Compare, DefaultValue, Schema};
use serde_json::{Value, json};

fn non_negative(value: &Value) -> Result<(), String> {
    match value.as_i64() {
        Some(n) if n >= 0 => Ok(()),
        _ => Err("must be non-negative".into()),
    }
}

static WIDGET: Schema = Schema {
    type_name: "test_widget",
    attributes: &[
        Attribute::computed("arn", AttrType::String),
        Attribute::required("name", AttrType::String),
        Attribute::required("kind", AttrType::String).force_new(),
        Attribute::optional("count", AttrType::Int)
            .default_value(DefaultValue::Int(0))
            .validate_with(non_negative),
        Attribute::optional("enabled", AttrType::Bool).default_value(DefaultValue::Bool(true)),
        Attribute::optional_computed("policy", AttrType::String).compare(Compare::Json),
        Attribute::optional("window", AttrType::Int)
            .default_value(DefaultValue::Int(30))
            .not_importable(),
        Attribute::optional("rules", AttrType::StringList),
        Attribute::tags(),
        Attribute::tags_all(),
    ],
};

#[test]
fn validate_accepts_minimal_config() {
    let attrs = WIDGET
        .validate(&json!({"name": "a", "kind": "x"}))
        .unwrap();
    assert_eq!(attrs.len(), 2);
}

#[test]
fn validate_rejects_bad_input_before_anything_else() {
    assert_eq!(
        WIDGET.validate(&json!({"kind": "x"})).unwrap_err(),
        CoreError::MissingAttribute("name".into())
    );
    assert!(matches!(
        WIDGET.validate(&json!({"name": "a", "kind": "x", "bogus": 1})),
        Err(CoreError::UnknownAttribute(_))
    ));
    assert!(matches!(
        WIDGET.validate(&json!({"name": "a", "kind": "x", "arn": "arn:x"})),
        Err(CoreError::ComputedAttribute(_))
    ));
    assert!(matches!(
        WIDGET.validate(&json!({"name": "a", "kind": "x", "enabled": "yes"})),
        Err(CoreError::TypeMismatch { .. })
    ));
    assert!(matches!(
        WIDGET.validate(&json!({"name": "a", "kind": "x", "count": -1})),
        Err(CoreError::InvalidValue { .. })
    ));
    assert!(matches!(
        WIDGET.validate(&json!(["not", "an", "object"])),
        Err(CoreError::NotAnObject(_))
    ));
}

#[test]
fn defaults_fill_unset_optionals_only() {
    let mut attrs = WIDGET
        .validate(&json!({"name": "a", "kind": "x", "count": 5}))
        .unwrap();
    WIDGET.apply_defaults(&mut attrs);
    assert_eq!(attrs["count"], json!(5));
    assert_eq!(attrs["enabled"], json!(true));
    assert_eq!(attrs["window"], json!(30));
    assert!(!attrs.contains_key("policy"));
}

#[test]
fn identical_state_has_no_delta() {
    let mut desired = WIDGET
        .validate(&json!({"name": "a", "kind": "x"}))
        .unwrap();
    WIDGET.apply_defaults(&mut desired);
    let prior = desired.clone();
    assert!(WIDGET.diff(&prior, &desired).is_empty());
}

#[test]
fn delta_flags_replacement_attributes() {
    let prior = json!({"name": "a", "kind": "x", "count": 0, "enabled": true, "window": 30});
    let desired = json!({"name": "b", "kind": "y", "count": 0, "enabled": true, "window": 30});
    let delta = WIDGET.diff(
        prior.as_object().unwrap(),
        desired.as_object().unwrap(),
    );

    assert_eq!(delta.fields().collect::<Vec<_>>(), vec!["name", "kind"]);
    assert!(delta.requires_replacement());
    assert!(!delta.get("name").unwrap().forces_replacement);
}

#[test]
fn json_attributes_compare_semantically() {
    let prior = json!({"name": "a", "kind": "x", "policy": "{\"b\": 1, \"a\": [1,2]}"});
    let desired = json!({"name": "a", "kind": "x", "policy": "{\"a\":[1,2],\"b\":1}"});
    let delta = WIDGET.diff(
        prior.as_object().unwrap(),
        desired.as_object().unwrap(),
    );
    assert!(!delta.has_change("policy"));
}

#[test]
fn unset_optional_computed_accepts_remote_value() {
    let prior = json!({"name": "a", "kind": "x", "policy": "{}"});
    let desired = json!({"name": "a", "kind": "x"});
    let delta = WIDGET.diff(
        prior.as_object().unwrap(),
        desired.as_object().unwrap(),
    );
    assert!(!delta.has_change("policy"));
}

#[test]
fn empty_collections_equal_null() {
    let prior = json!({"name": "a", "kind": "x", "rules": [], "tags_all": {}});
    let desired = json!({"name": "a", "kind": "x", "tags_all": null});
    let delta = WIDGET.diff(
        prior.as_object().unwrap(),
        desired.as_object().unwrap(),
    );
    assert!(!delta.has_change("rules"));
    assert!(!delta.has_change("tags_all"));
}

#[test]
fn tags_compare_through_tags_all() {
    let prior = json!({"name": "a", "kind": "x", "tags": {}, "tags_all": {"env": "prod"}});
    let desired = json!({
        "name": "a",
        "kind": "x",
        "tags": {"env": "prod"},
        "tags_all": {"env": "prod"},
    });
    let delta = WIDGET.diff(
        prior.as_object().unwrap(),
        desired.as_object().unwrap(),
    );
    assert!(delta.is_empty());
}

#[test]
fn configuration_only_attributes_survive_refresh_and_import() {
    let prior = json!({"name": "a", "window": 7});
    let mut refreshed = json!({"name": "a"}).as_object().unwrap().clone();
    WIDGET.carry_forward(prior.as_object().unwrap(), &mut refreshed);
    assert_eq!(refreshed["window"], json!(7));

    let mut imported = json!({"name": "a"}).as_object().unwrap().clone();
    WIDGET.apply_import_defaults(&mut imported);
    assert_eq!(imported["window"], json!(30));
    assert!(!imported.contains_key("enabled"));
}
