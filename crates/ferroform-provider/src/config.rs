use std::path::Path;
use std::time::Duration;

use ferroform_core::{IgnoreConfig, TagMap};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
const CURRENT_VERSION: u32 = 1;

/// Process-wide provider settings, passed explicitly into every handler call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    /// Region resources are managed in.
    pub region: String,
    #[serde(default)]
    pub credentials: CredentialSource,
    /// Tags applied to every taggable resource; resource tags win on conflict.
    #[serde(default)]
    pub default_tags: TagMap,
    /// Remote tags never read into state or removed.
    #[serde(default)]
    pub ignore_tags: IgnoreConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialSource {
    Inline {
        access_key_id: String,
        secret_access_key: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        session_token: Option<String>,
    },
    Profile {
        profile_name: String,
    },
    #[default]
    DefaultChain,
}

/// Backoff for retryable (transient / conflict) errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 25,
            base_delay_ms: 500,
            max_delay_ms: 20_000,
        }
    }
}

impl RetrySettings {
    /// Delay before retry number `attempt` (1-based): exponential, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

/// Upper bounds for long-running waits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timeouts {
    pub create_secs: u64,
    pub update_secs: u64,
    pub delete_secs: u64,
    /// How long eventually-consistent reads (e.g. a primary key becoming
    /// visible in another region) are retried.
    pub propagation_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create_secs: 600,
            update_secs: 600,
            delete_secs: 600,
            propagation_secs: 120,
            poll_interval_ms: 2_000,
        }
    }
}

impl Timeouts {
    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create_secs)
    }

    pub fn update(&self) -> Duration {
        Duration::from_secs(self.update_secs)
    }

    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete_secs)
    }

    pub fn propagation(&self) -> Duration {
        Duration::from_secs(self.propagation_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ProviderConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            config_version: CURRENT_VERSION,
            region: region.into(),
            credentials: CredentialSource::default(),
            default_tags: TagMap::new(),
            ignore_tags: IgnoreConfig::default(),
            retry: RetrySettings::default(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_default_tags(mut self, tags: TagMap) -> Self {
        self.default_tags = tags;
        self
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in
    /// production; tests pass a closure.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(region) = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")) {
            if !region.is_empty() && region != self.region {
                tracing::debug!(
                    from = %self.region,
                    to = %region,
                    "region overridden from environment"
                );
                self.region = region;
            }
        }
        if let Some(profile) = lookup("AWS_PROFILE") {
            if !profile.is_empty() && self.credentials == CredentialSource::DefaultChain {
                self.credentials = CredentialSource::Profile {
                    profile_name: profile,
                };
            }
        }
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.region.is_empty() {
            return Err(ProviderError::Config("region must be set".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ProviderError::Config("retry.max_attempts must be at least 1".into()));
        }
        if let Some(key) = self.default_tags.keys().find(|k| self.ignore_tags.ignores(k)) {
            return Err(ProviderError::Config(format!(
                "default tag {key:?} is also ignored"
            )));
        }
        Ok(())
    }
}

/// Load a provider config file, migrating older shapes forward and applying
/// environment overrides.
pub fn load_config(path: &Path) -> Result<ProviderConfig, ProviderError> {
    load_config_with(path, |k| std::env::var(k).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ProviderConfig, ProviderError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ProviderError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;

    // Parse as raw JSON so we can run migrations before deserializing.
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    let on_disk_version = json
        .get("config_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let migrated = migrate(json, on_disk_version)?;
    let mut config: ProviderConfig = serde_json::from_value(migrated)?;
    config.apply_env_overrides(lookup);
    config.validate()?;
    Ok(config)
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
fn migrate(
    mut json: serde_json::Value,
    from_version: u32,
) -> Result<serde_json::Value, ProviderError> {
    if from_version > CURRENT_VERSION {
        return Err(ProviderError::Config(format!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION})"
        )));
    }

    // v0 → v1: top-level `tags` became `default_tags`
    if from_version < 1 {
        let obj = json
            .as_object_mut()
            .ok_or_else(|| ProviderError::Config("config is not a JSON object".into()))?;
        if let Some(tags) = obj.remove("tags") {
            obj.entry("default_tags").or_insert(tags);
        }
        obj.insert(
            "config_version".to_string(),
            serde_json::Value::Number(1.into()),
        );
        tracing::info!("migrated config v0 → v1 (tags → default_tags)");
    }

    Ok(json)
}

/// Write the config atomically (tmp + rename), stamped with the current version.
pub fn save_config(path: &Path, config: &ProviderConfig) -> Result<(), ProviderError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;
    let json = serde_json::to_string_pretty(&stamped)?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())?;

    // Inline credentials may be present
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
