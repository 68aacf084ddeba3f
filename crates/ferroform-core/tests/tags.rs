use ferroform_core::tags::{IgnoreConfig, TagDiff, TagMap};
use proptest::prelude::*;

fn tags(pairs: &[(&str, &str)]) -> TagMap {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

#[test]
fn diff_splits_add_update_remove() {
    let remote = tags(&[("key1", "value1"), ("stale", "x")]);
    let desired = tags(&[("key1", "value1updated"), ("key2", "value2")]);

    let diff = TagDiff::between(&remote, &desired);
    assert_eq!(diff.add, tags(&[("key2", "value2")]));
    assert_eq!(diff.update, tags(&[("key1", "value1updated")]));
    assert_eq!(diff.remove, vec!["stale".to_string()]);
    assert_eq!(
        diff.upserts(),
        tags(&[("key1", "value1updated"), ("key2", "value2")])
    );
}

#[test]
fn identical_sets_produce_empty_diff() {
    let t = tags(&[("a", "1"), ("b", "2")]);
    assert!(TagDiff::between(&t, &t).is_empty());
    assert!(TagDiff::between(&TagMap::new(), &TagMap::new()).is_empty());
}

#[test]
fn system_tags_are_never_removed() {
    let remote = tags(&[("aws:cloudformation:stack-name", "s"), ("a", "1")]);
    let diff = TagDiff::between(&remote, &TagMap::new());
    assert_eq!(diff.remove, vec!["a".to_string()]);
}

#[test]
fn resource_tags_override_defaults() {
    let defaults = tags(&[("env", "prod"), ("team", "infra")]);
    let resource = tags(&[("team", "data"), ("Name", "x")]);

    let all = resource.merge_defaults(&defaults);
    assert_eq!(
        all,
        tags(&[("env", "prod"), ("team", "data"), ("Name", "x")])
    );
    assert_eq!(all.without_defaults(&defaults), resource);
}

#[test]
fn ignore_config_filters_keys_and_prefixes() {
    let ignore = IgnoreConfig {
        keys: vec!["CostCenter".into()],
        key_prefixes: vec!["kubernetes.io/".into()],
    };
    let remote = tags(&[
        ("CostCenter", "1"),
        ("kubernetes.io/cluster", "owned"),
        ("aws:createdBy", "me"),
        ("keep", "yes"),
    ]);
    assert_eq!(remote.ignoring(&ignore), tags(&[("keep", "yes")]));
}

#[test]
fn from_value_rejects_non_string_values() {
    let ok = TagMap::from_value("tags", &serde_json::json!({"a": "1"})).unwrap();
    assert_eq!(ok, tags(&[("a", "1")]));
    assert!(TagMap::from_value("tags", &serde_json::Value::Null).unwrap().is_empty());
    assert!(TagMap::from_value("tags", &serde_json::json!({"a": 1})).is_err());
    assert!(TagMap::from_value("tags", &serde_json::json!(["a"])).is_err());
}

fn tag_map_strategy() -> impl Strategy<Value = TagMap> {
    prop::collection::btree_map("[a-d]{1,2}", "[0-2]", 0..6).prop_map(TagMap::from)
}

proptest! {
    #[test]
    fn applying_a_diff_converges_and_is_idempotent(
        remote in tag_map_strategy(),
        desired in tag_map_strategy(),
    ) {
        let diff = TagDiff::between(&remote, &desired);
        let applied = diff.apply_to(&remote);
        prop_assert_eq!(&applied, &desired);
        prop_assert!(TagDiff::between(&applied, &desired).is_empty());
    }

    #[test]
    fn defaults_round_trip(resource in tag_map_strategy(), defaults in tag_map_strategy()) {
        let all = resource.merge_defaults(&defaults);
        let recovered = all.without_defaults(&defaults);
        // Entries equal to the default for the same key fold into tags_all only.
        prop_assert_eq!(recovered.merge_defaults(&defaults), all);
    }
}
