use ferroform_provider::ProviderConfig;
use ferroform_provider::config::{RetrySettings, Timeouts};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::error::HarnessError;

pub const RESOURCE_PREFIX: &str = "tf-acc-test";

pub const DEFAULT_REGION: &str = "us-west-2";
pub const ALTERNATE_REGION: &str = "us-east-1";
pub const THIRD_REGION: &str = "us-east-2";

/// Install a test-writer subscriber once per process. The filter comes
/// from `FERROFORM_LOG`, default `info`.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_env("FERROFORM_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// `tf-acc-test-<random>`, unique per call.
pub fn random_name() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{RESOURCE_PREFIX}-{}", &suffix[..16])
}

/// Provider configuration tuned for the in-memory fakes: short polls and
/// backoff, bounded waits.
pub fn fake_config(region: &str) -> ProviderConfig {
    let mut config = ProviderConfig::new(region);
    config.retry = RetrySettings {
        max_attempts: 5,
        base_delay_ms: 10,
        max_delay_ms: 100,
    };
    config.timeouts = Timeouts {
        create_secs: 60,
        update_secs: 60,
        delete_secs: 60,
        propagation_secs: 30,
        poll_interval_ms: 50,
    };
    config
}

/// Regions for live runs, from `AWS_DEFAULT_REGION`,
/// `AWS_ALTERNATE_REGION` and `AWS_THIRD_REGION`. Fails unless `count`
/// distinct regions are configured.
pub fn pre_check_regions(count: usize) -> Result<Vec<String>, HarnessError> {
    let regions: Vec<String> = ["AWS_DEFAULT_REGION", "AWS_ALTERNATE_REGION", "AWS_THIRD_REGION"]
        .iter()
        .filter_map(|k| std::env::var(k).ok())
        .filter(|r| !r.is_empty())
        .take(count)
        .collect();

    let mut distinct = regions.clone();
    distinct.sort();
    distinct.dedup();
    if regions.len() < count || distinct.len() < count {
        return Err(HarnessError::PreCheck(format!(
            "{count} distinct regions required, got {regions:?}"
        )));
    }
    Ok(regions)
}
