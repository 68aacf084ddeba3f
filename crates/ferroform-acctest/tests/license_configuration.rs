use std::sync::Arc;

use ferroform_acctest::env::DEFAULT_REGION;
use ferroform_acctest::fakes::ACCOUNT_ID;
use ferroform_acctest::{
    Check, Config, FakeConnections, Harness, RunOutcome, Step, TestCase, fake_config,
    init_logging, random_name,
};
use ferroform_provider::ProviderError;
use serde_json::{Value, json};

const RESOURCE: &str = "aws_licensemanager_license_configuration.test";
const DAILY_LIMIT: &str = "You have reached the maximum allowed number of license configurations created in one day";

fn setup() -> (Arc<FakeConnections>, Harness) {
    init_logging();
    let conns = Arc::new(FakeConnections::new(DEFAULT_REGION));
    let harness = Harness::new(fake_config(DEFAULT_REGION), conns.clone());
    (conns, harness)
}

fn license(body: Value) -> Config {
    Config::new().resource("aws_licensemanager_license_configuration", "test", body)
}

/// The account-wide daily creation quota is a reason to skip, not fail.
fn case(steps: Vec<Step>) -> TestCase {
    TestCase::new(steps).skip_on_message(DAILY_LIMIT)
}

#[tokio::test(start_paused = true)]
async fn license_configuration_basic() {
    let (_conns, mut harness) = setup();
    let name = random_name();

    let outcome = harness
        .run(case(vec![
            Step::apply(
                license(json!({ "name": name, "license_counting_type": "Instance" })),
                vec![
                    Check::exists(RESOURCE),
                    Check::regional_arn(
                        RESOURCE,
                        "arn",
                        "license-manager",
                        DEFAULT_REGION,
                        "license-configuration:lic-.+",
                    ),
                    Check::attr(RESOURCE, "description", ""),
                    Check::attr(RESOURCE, "license_count", "0"),
                    Check::attr(RESOURCE, "license_count_hard_limit", "false"),
                    Check::attr(RESOURCE, "license_counting_type", "Instance"),
                    Check::attr(RESOURCE, "license_rules.#", "0"),
                    Check::attr(RESOURCE, "name", name.clone()),
                    Check::attr(RESOURCE, "owner_account_id", ACCOUNT_ID),
                    Check::attr(RESOURCE, "tags.%", "0"),
                ],
            ),
            Step::import(RESOURCE),
        ]))
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Passed);
}

#[tokio::test(start_paused = true)]
async fn license_configuration_disappears() {
    let (conns, mut harness) = setup();

    harness
        .run(case(vec![
            Step::apply(
                license(json!({ "name": random_name(), "license_counting_type": "Instance" })),
                vec![Check::exists(RESOURCE)],
            ),
            Step::disappear(RESOURCE),
        ]))
        .await
        .unwrap();

    assert!(conns.license_manager.is_empty());
}

#[tokio::test(start_paused = true)]
async fn license_configuration_tags() {
    let (conns, mut harness) = setup();
    let name = random_name();
    let config = |tags: Value| {
        license(json!({ "name": name, "license_counting_type": "Instance", "tags": tags }))
    };

    harness
        .run(case(vec![
            Step::apply(
                config(json!({ "key1": "value1" })),
                vec![
                    Check::attr(RESOURCE, "tags.%", "1"),
                    Check::attr(RESOURCE, "tags.key1", "value1"),
                ],
            ),
            Step::import(RESOURCE),
            Step::apply(
                config(json!({ "key1": "value1updated", "key2": "value2" })),
                vec![
                    Check::attr(RESOURCE, "tags.%", "2"),
                    Check::attr(RESOURCE, "tags.key1", "value1updated"),
                    Check::attr(RESOURCE, "tags.key2", "value2"),
                ],
            ),
            Step::apply(
                config(json!({ "key2": "value2" })),
                vec![
                    Check::attr(RESOURCE, "tags.%", "1"),
                    Check::attr(RESOURCE, "tags.key2", "value2"),
                ],
            ),
        ]))
        .await
        .unwrap();

    assert!(conns.license_manager.is_empty());
}

#[tokio::test(start_paused = true)]
async fn license_configuration_update() {
    let (conns, mut harness) = setup();
    let (name1, name2) = (random_name(), random_name());

    harness
        .run(case(vec![
            Step::apply(
                license(json!({
                    "name": name1,
                    "description": "test1",
                    "license_count": 10,
                    "license_count_hard_limit": true,
                    "license_counting_type": "Socket",
                    "license_rules": ["#minimumSockets=3"],
                })),
                vec![
                    Check::attr(RESOURCE, "description", "test1"),
                    Check::attr(RESOURCE, "license_count", "10"),
                    Check::attr(RESOURCE, "license_count_hard_limit", "true"),
                    Check::attr(RESOURCE, "license_counting_type", "Socket"),
                    Check::attr(RESOURCE, "license_rules.#", "1"),
                    Check::attr(RESOURCE, "license_rules.0", "#minimumSockets=3"),
                    Check::attr(RESOURCE, "name", name1.clone()),
                ],
            ),
            Step::import(RESOURCE),
            Step::apply(
                license(json!({
                    "name": name2,
                    "description": "test2",
                    "license_count": 99,
                    "license_count_hard_limit": false,
                    "license_counting_type": "Socket",
                    "license_rules": ["#minimumSockets=3"],
                })),
                vec![
                    Check::attr(RESOURCE, "description", "test2"),
                    Check::attr(RESOURCE, "license_count", "99"),
                    Check::attr(RESOURCE, "license_count_hard_limit", "false"),
                    Check::attr(RESOURCE, "license_rules.0", "#minimumSockets=3"),
                    Check::attr(RESOURCE, "name", name2.clone()),
                ],
            ),
        ]))
        .await
        .unwrap();

    // One create, one in-place update: no replacement along the way.
    assert_eq!(conns.log().count("license-manager:CreateLicenseConfiguration"), 1);
    assert_eq!(conns.log().count("license-manager:UpdateLicenseConfiguration"), 1);
}

#[tokio::test(start_paused = true)]
async fn changing_counting_type_replaces() {
    let (conns, mut harness) = setup();
    let name = random_name();

    harness
        .apply(&license(json!({ "name": name, "license_counting_type": "Instance" })))
        .await
        .unwrap();
    let first = harness.state().get(RESOURCE).unwrap().id.clone();

    let changed = license(json!({ "name": name, "license_counting_type": "Core" }));
    let pending = harness.pending_changes(&changed).unwrap();
    assert_eq!(pending.len(), 1, "{pending:?}");
    assert!(pending[0].starts_with(RESOURCE), "{pending:?}");
    assert!(pending[0].contains("Replace license_counting_type"), "{pending:?}");
    harness.apply(&changed).await.unwrap();

    let second = harness.state().get(RESOURCE).unwrap().id.clone();
    assert_ne!(first, second);
    assert!(conns.license_manager.get(&first).is_none());
    assert_eq!(conns.license_manager.len(), 1);

    harness.destroy().await.unwrap();
    assert!(conns.license_manager.is_empty());
}

#[tokio::test(start_paused = true)]
async fn daily_creation_quota_skips_the_case() {
    let (conns, mut harness) = setup();
    conns.license_manager.fail_next(
        "CreateLicenseConfiguration",
        ProviderError::Fatal(format!("ResourceLimitExceededException: {DAILY_LIMIT}")),
    );

    let outcome = harness
        .run(case(vec![Step::apply(
            license(json!({ "name": random_name(), "license_counting_type": "Instance" })),
            vec![Check::exists(RESOURCE)],
        )]))
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Skipped(_)), "{outcome:?}");
}

#[tokio::test(start_paused = true)]
async fn rules_without_a_marker_are_rejected() {
    let (conns, mut harness) = setup();

    let err = harness
        .run(case(vec![Step::apply(
            license(json!({
                "name": random_name(),
                "license_counting_type": "Socket",
                "license_rules": ["minimumSockets=3"],
            })),
            vec![],
        )]))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("license_rules"), "{err}");
    assert!(conns.log().is_empty());
}
