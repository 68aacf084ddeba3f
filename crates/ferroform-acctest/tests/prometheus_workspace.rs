use std::sync::Arc;

use ferroform_acctest::env::DEFAULT_REGION;
use ferroform_acctest::{
    Check, Config, FakeConnections, Harness, HarnessError, Step, TestCase, fake_config,
    init_logging,
};
use ferroform_core::TagMap;
use ferroform_provider::{ProviderConfig, ProviderError};
use ferroform_provider::tagging::Tagger;
use serde_json::{Value, json};

const RESOURCE: &str = "aws_prometheus_workspace.test";

fn setup(config: ProviderConfig) -> (Arc<FakeConnections>, Harness) {
    init_logging();
    let conns = Arc::new(FakeConnections::new(DEFAULT_REGION));
    let harness = Harness::new(config, conns.clone());
    (conns, harness)
}

fn workspace(body: Value) -> Config {
    Config::new().resource("aws_prometheus_workspace", "test", body)
}

#[tokio::test(start_paused = true)]
async fn workspace_basic() {
    let (conns, mut harness) = setup(fake_config(DEFAULT_REGION));

    harness
        .run(TestCase::new(vec![
            Step::apply(
                workspace(json!({})),
                vec![
                    Check::regional_arn(RESOURCE, "arn", "aps", DEFAULT_REGION, "workspace/.+"),
                    Check::no_attr(RESOURCE, "alias"),
                    Check::matches(RESOURCE, "prometheus_endpoint", "^https://aps-workspaces\\."),
                    Check::attr(RESOURCE, "tags.%", "0"),
                ],
            ),
            Step::import(RESOURCE),
        ]))
        .await
        .unwrap();

    assert!(conns.amp.is_empty());
}

#[tokio::test(start_paused = true)]
async fn workspace_alias() {
    let (conns, mut harness) = setup(fake_config(DEFAULT_REGION));
    conns.amp.set_settle_polls(3);

    harness
        .run(TestCase::new(vec![
            Step::apply(
                workspace(json!({ "alias": "first" })),
                vec![Check::attr(RESOURCE, "alias", "first")],
            ),
            Step::import(RESOURCE),
            Step::apply(
                workspace(json!({ "alias": "second" })),
                vec![Check::attr(RESOURCE, "alias", "second")],
            ),
            Step::apply(workspace(json!({})), vec![Check::no_attr(RESOURCE, "alias")]),
        ]))
        .await
        .unwrap();

    assert_eq!(conns.log().count("aps:CreateWorkspace"), 1);
    assert_eq!(conns.log().count("aps:UpdateWorkspaceAlias"), 2);
}

#[tokio::test(start_paused = true)]
async fn workspace_tags_with_provider_defaults() {
    let mut config = fake_config(DEFAULT_REGION);
    config.default_tags = [("providerkey1", "providervalue1")].into_iter().collect();
    let (_conns, mut harness) = setup(config);

    harness
        .run(TestCase::new(vec![
            Step::apply(
                workspace(json!({ "tags": { "key1": "value1" } })),
                vec![
                    Check::attr(RESOURCE, "tags.%", "1"),
                    Check::attr(RESOURCE, "tags.key1", "value1"),
                    Check::full_resource_tags(
                        RESOURCE,
                        &[("key1", "value1"), ("providerkey1", "providervalue1")],
                    ),
                ],
            ),
            Step::import(RESOURCE),
            // A resource tag wins over the default with the same key.
            Step::apply(
                workspace(json!({ "tags": { "providerkey1": "resourcevalue1" } })),
                vec![
                    Check::attr(RESOURCE, "tags.%", "1"),
                    Check::attr(RESOURCE, "tags.providerkey1", "resourcevalue1"),
                    Check::full_resource_tags(RESOURCE, &[("providerkey1", "resourcevalue1")]),
                ],
            ),
            Step::apply(
                workspace(json!({})),
                vec![
                    Check::attr(RESOURCE, "tags.%", "0"),
                    Check::full_resource_tags(RESOURCE, &[("providerkey1", "providervalue1")]),
                ],
            ),
        ]))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn ignored_remote_tags_stay_out_of_state() {
    let mut config = fake_config(DEFAULT_REGION);
    config.ignore_tags.key_prefixes = vec!["ignored/".into()];
    let (conns, mut harness) = setup(config);
    let body = workspace(json!({ "tags": { "key1": "value1" } }));

    harness.apply(&body).await.unwrap();
    let arn = harness
        .state()
        .get(RESOURCE)
        .unwrap()
        .get_str("arn")
        .unwrap()
        .to_string();

    let external: TagMap = [("ignored/owner", "someone-else")].into_iter().collect();
    conns.amp.tag_resource(&arn, &external).await.unwrap();

    harness.refresh().await.unwrap();
    assert!(harness.pending_changes(&body).unwrap().is_empty());
    let state = harness.state().get(RESOURCE).unwrap();
    assert_eq!(state.get("tags_all"), Some(&json!({ "key1": "value1" })));

    // Dropping key1 leaves the ignored tag alone.
    harness.apply(&workspace(json!({}))).await.unwrap();
    let id = harness.state().get(RESOURCE).unwrap().id.clone();
    assert!(conns.amp.workspace(&id).is_some());
    harness.destroy().await.unwrap();
    assert_eq!(conns.log().count("aps:UntagResource"), 1);
}

#[tokio::test(start_paused = true)]
async fn alias_update_while_busy_is_retried() {
    let (conns, mut harness) = setup(fake_config(DEFAULT_REGION));

    harness.apply(&workspace(json!({ "alias": "one" }))).await.unwrap();
    let before = conns.log().len();

    conns.amp.fail_next(
        "UpdateWorkspaceAlias",
        ProviderError::Conflict("ConflictException: workspace is UPDATING".into()),
    );
    harness.apply(&workspace(json!({ "alias": "two" }))).await.unwrap();
    let state = harness.state().get(RESOURCE).unwrap();
    assert_eq!(state.get_str("alias"), Some("two"));

    let calls = conns.log().since(before);
    let attempts = calls.iter().filter(|c| *c == "aps:UpdateWorkspaceAlias").count();
    assert_eq!(attempts, 2, "{calls:?}");
    harness.destroy().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn alias_longer_than_limit_is_rejected() {
    let (conns, mut harness) = setup(fake_config(DEFAULT_REGION));

    let err = harness
        .run(TestCase::new(vec![Step::apply(
            workspace(json!({ "alias": "a".repeat(101) })),
            vec![],
        )]))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("alias"), "{err}");
    assert!(conns.log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn resource_tag_equal_to_default_stays_in_tags() {
    let mut config = fake_config(DEFAULT_REGION);
    config.default_tags = [("providerkey1", "providervalue1")].into_iter().collect();
    let (_conns, mut harness) = setup(config);

    harness
        .run(TestCase::new(vec![
            Step::apply(
                workspace(json!({ "tags": { "providerkey1": "providervalue1" } })),
                vec![
                    Check::attr(RESOURCE, "tags.%", "1"),
                    Check::attr(RESOURCE, "tags.providerkey1", "providervalue1"),
                    Check::full_resource_tags(RESOURCE, &[("providerkey1", "providervalue1")]),
                ],
            ),
            Step::apply(
                workspace(json!({})),
                vec![
                    Check::attr(RESOURCE, "tags.%", "0"),
                    Check::full_resource_tags(RESOURCE, &[("providerkey1", "providervalue1")]),
                ],
            ),
        ]))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn workspace_that_never_activates_is_replaced() {
    let mut config = fake_config(DEFAULT_REGION);
    config.timeouts.create_secs = 5;
    let (conns, mut harness) = setup(config);
    conns.amp.set_settle_polls(u32::MAX);
    let body = workspace(json!({ "alias": "stuck" }));

    let err = harness.apply(&body).await.unwrap_err();
    let stuck = match err {
        HarnessError::Provider(ProviderError::IncompleteCreate { source, state }) => {
            assert!(matches!(*source, ProviderError::Timeout { .. }), "{source}");
            assert!(state.tainted);
            state.id
        }
        other => panic!("expected an incomplete create, got {other:?}"),
    };
    assert!(conns.amp.workspace(&stuck).is_some());
    assert!(harness.state().get(RESOURCE).unwrap().tainted);

    conns.amp.set_settle_polls(1);
    harness.apply(&body).await.unwrap();

    let state = harness.state().get(RESOURCE).unwrap();
    assert!(!state.tainted);
    assert_ne!(state.id, stuck);
    assert!(conns.amp.workspace(&stuck).is_none());
    assert_eq!(conns.log().count("aps:CreateWorkspace"), 2);
    assert_eq!(conns.log().count("aps:DeleteWorkspace"), 1);

    harness.destroy().await.unwrap();
    assert!(conns.amp.is_empty());
}
