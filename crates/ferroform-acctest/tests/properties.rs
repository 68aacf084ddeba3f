//! Behaviour every resource type shares, exercised through the provider
//! facade against the in-memory control planes.

use std::collections::BTreeMap;
use std::sync::Arc;

use ferroform_acctest::env::{ALTERNATE_REGION, DEFAULT_REGION};
use ferroform_acctest::{FakeConnections, fake_config, init_logging, random_name};
use ferroform_core::TagMap;
use ferroform_provider::{OperationContext, PlanAction, Provider};
use proptest::prelude::*;
use serde_json::{Value, json};

struct Fixture {
    conns: Arc<FakeConnections>,
    provider: Provider,
    ctx: OperationContext,
}

impl Fixture {
    fn new() -> Self {
        init_logging();
        let conns = Arc::new(FakeConnections::new(DEFAULT_REGION));
        let provider = Provider::new(fake_config(DEFAULT_REGION), conns.clone());
        Self {
            conns,
            provider,
            ctx: OperationContext::new(),
        }
    }

    /// One minimal configuration per resource type.
    fn configs(&self) -> Vec<(&'static str, Value)> {
        let primary = self.conns.kms.create_primary_key(ALTERNATE_REGION, "primary");
        vec![
            (
                "aws_kms_replica_key",
                json!({ "primary_key_arn": primary.arn, "description": "replica" }),
            ),
            (
                "aws_licensemanager_license_configuration",
                json!({
                    "name": random_name(),
                    "license_counting_type": "vCPU",
                    "license_count": 4,
                }),
            ),
            ("aws_prometheus_workspace", json!({ "alias": "props" })),
        ]
    }
}

#[tokio::test(start_paused = true)]
async fn read_after_create_matches_create() {
    let f = Fixture::new();
    for (resource_type, config) in f.configs() {
        let created = f.provider.create(&f.ctx, resource_type, &config).await.unwrap();
        let read = f.provider.read(&f.ctx, &created).await.unwrap().unwrap();
        assert_eq!(read.attributes, created.attributes, "{resource_type}");

        // Everything configured comes back as configured.
        for (k, v) in config.as_object().unwrap() {
            assert_eq!(read.get(k), Some(v), "{resource_type}.{k}");
        }
    }
}

#[tokio::test(start_paused = true)]
async fn delete_is_idempotent() {
    let f = Fixture::new();
    for (resource_type, config) in f.configs() {
        let created = f.provider.create(&f.ctx, resource_type, &config).await.unwrap();
        f.provider.delete(&f.ctx, &created).await.unwrap();
        f.provider.delete(&f.ctx, &created).await.unwrap();
        assert!(f.provider.read(&f.ctx, &created).await.unwrap().is_none(), "{resource_type}");
    }
}

#[tokio::test(start_paused = true)]
async fn unchanged_update_makes_no_calls() {
    let f = Fixture::new();
    for (resource_type, config) in f.configs() {
        let created = f.provider.create(&f.ctx, resource_type, &config).await.unwrap();

        let plan = f.provider.plan(resource_type, Some(&created), &config).unwrap();
        assert_eq!(plan.action, PlanAction::NoOp, "{resource_type}: {:?}", plan.delta);

        let before = f.conns.log().len();
        let updated = f.provider.update(&f.ctx, &created, &config).await.unwrap();
        assert_eq!(f.conns.log().len(), before, "{resource_type}");
        assert_eq!(updated, created);
    }
}

#[tokio::test(start_paused = true)]
async fn import_plans_no_changes() {
    let f = Fixture::new();
    for (resource_type, config) in f.configs() {
        let created = f.provider.create(&f.ctx, resource_type, &config).await.unwrap();
        let imported = f.provider.import(&f.ctx, resource_type, &created.id).await.unwrap();
        assert_eq!(imported.id, created.id);

        let plan = f.provider.plan(resource_type, Some(&imported), &config).unwrap();
        assert_eq!(plan.action, PlanAction::NoOp, "{resource_type}: {:?}", plan.delta);
    }
}

#[tokio::test(start_paused = true)]
async fn import_cannot_recover_configuration_only_attributes() {
    let f = Fixture::new();
    let primary = f.conns.kms.create_primary_key(ALTERNATE_REGION, "primary");
    let config = json!({ "primary_key_arn": primary.arn, "deletion_window_in_days": 7 });

    let created = f.provider.create(&f.ctx, "aws_kms_replica_key", &config).await.unwrap();
    assert_eq!(created.get_i64("deletion_window_in_days"), Some(7));

    let imported = f.provider.import(&f.ctx, "aws_kms_replica_key", &created.id).await.unwrap();
    assert_eq!(imported.get_i64("deletion_window_in_days"), Some(30));

    let plan = f.provider.plan("aws_kms_replica_key", Some(&imported), &config).unwrap();
    assert_eq!(plan.action, PlanAction::Update);
    assert_eq!(plan.delta.fields().collect::<Vec<_>>(), vec!["deletion_window_in_days"]);
}

#[tokio::test(start_paused = true)]
async fn tag_updates_converge() {
    let f = Fixture::new();
    let name = random_name();
    let config = |tags: Value| {
        json!({ "name": name, "license_counting_type": "Core", "tags": tags })
    };

    let mut state = f
        .provider
        .create(&f.ctx, "aws_licensemanager_license_configuration", &config(json!({ "A": "1" })))
        .await
        .unwrap();

    for tags in [json!({ "A": "1", "B": "2" }), json!({ "B": "2" }), json!({})] {
        state = f.provider.update(&f.ctx, &state, &config(tags.clone())).await.unwrap();
        let remote = f.conns.license_manager.get(&state.id).unwrap().tags;
        assert_eq!(remote.to_value(), tags);
        assert_eq!(state.get("tags"), Some(&tags));
    }
}

fn tag_sets() -> impl Strategy<Value = Vec<BTreeMap<String, String>>> {
    prop::collection::vec(prop::collection::btree_map("[a-d]", "[x-z]{1,2}", 0..4), 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_tag_sequence_converges(sequence in tag_sets()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        rt.block_on(async {
            let f = Fixture::new();
            let name = random_name();
            let config = |tags: &BTreeMap<String, String>| {
                json!({ "name": name, "license_counting_type": "Instance", "tags": tags })
            };

            let mut state = None;
            for tags in &sequence {
                let next = match &state {
                    None => f
                        .provider
                        .create(&f.ctx, "aws_licensemanager_license_configuration", &config(tags))
                        .await
                        .unwrap(),
                    Some(prior) => f.provider.update(&f.ctx, prior, &config(tags)).await.unwrap(),
                };

                let wanted: TagMap = tags.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                let remote = f.conns.license_manager.get(&next.id).unwrap().tags;
                prop_assert_eq!(&remote, &wanted);

                // Re-applying the same tags is a no-op.
                let before = f.conns.log().len();
                let again = f.provider.update(&f.ctx, &next, &config(tags)).await.unwrap();
                prop_assert_eq!(f.conns.log().len(), before);
                prop_assert_eq!(&again, &next);

                state = Some(next);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
