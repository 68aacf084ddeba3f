//! KMS across regions.
//!
//! Multi-Region keys share one key id in every region; keys are stored per
//! `(region, key_id)` and replication copies the primary into the target
//! region. New replicas start in `Creating` and settle to `Enabled` after a
//! configurable number of describes. Scheduled deletion leaves the key in
//! `PendingDeletion`, as KMS does.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use ferroform_core::{Arn, TagMap};
use ferroform_provider::ProviderError;
use ferroform_provider::handler::BoxFuture;
use ferroform_provider::services::kms::RESOURCE_TYPE;
use ferroform_provider::services::kms::api::{
    KEY_STATE_CREATING, KEY_STATE_DISABLED, KEY_STATE_ENABLED, KEY_STATE_PENDING_DELETION,
    KeyMetadata, KmsApi, MULTI_REGION_KEY_TYPE_PRIMARY, MULTI_REGION_KEY_TYPE_REPLICA,
    ReplicateKeyInput,
};
use ferroform_provider::tagging::Tagger;
use uuid::Uuid;

use super::{CallLog, Faults, lock, service_error};

const SERVICE: &str = "kms";

pub const KEY_SPEC_SYMMETRIC_DEFAULT: &str = "SYMMETRIC_DEFAULT";
pub const KEY_USAGE_ENCRYPT_DECRYPT: &str = "ENCRYPT_DECRYPT";

/// The policy KMS attaches when none is given.
pub fn default_key_policy(account_id: &str) -> String {
    format!(
        r#"{{"Version":"2012-10-17","Id":"key-default-1","Statement":[{{"Sid":"Enable IAM User Permissions","Effect":"Allow","Principal":{{"AWS":"arn:aws:iam::{account_id}:root"}},"Action":"kms:*","Resource":"*"}}]}}"#
    )
}

#[derive(Debug, Clone)]
struct StoredKey {
    meta: KeyMetadata,
    policy: String,
    rotation_enabled: bool,
    tags: TagMap,
    pending_polls: u32,
}

#[derive(Default)]
struct World {
    keys: BTreeMap<(String, String), StoredKey>,
    hidden_primary_calls: u32,
    creating_polls: u32,
}

/// Key store shared by every regional [`FakeKms`].
pub struct KmsBackend {
    account_id: String,
    log: CallLog,
    faults: Faults,
    world: Mutex<World>,
}

fn key_arn(region: &str, account_id: &str, key_id: &str) -> String {
    format!("arn:aws:kms:{region}:{account_id}:key/{key_id}")
}

/// Key ids and key ARNs are both accepted wherever KMS takes a key.
fn resolve_key_id(key: &str) -> String {
    match key.parse::<Arn>() {
        Ok(arn) => arn.resource_id().to_string(),
        Err(_) => key.to_string(),
    }
}

impl KmsBackend {
    pub fn new(account_id: &str, log: CallLog) -> Self {
        Self {
            account_id: account_id.to_string(),
            log,
            faults: Faults::default(),
            world: Mutex::new(World {
                creating_polls: 1,
                ..World::default()
            }),
        }
    }

    /// Create a multi-Region primary key in `region`, the way a separate
    /// `aws_kms_key` would have.
    pub fn create_primary_key(&self, region: &str, description: &str) -> KeyMetadata {
        let key_id = format!("mrk-{}", Uuid::new_v4().simple());
        self.insert_key(region, &key_id, description, Some(MULTI_REGION_KEY_TYPE_PRIMARY))
    }

    /// Create an ordinary single-Region key.
    pub fn create_single_region_key(&self, region: &str) -> KeyMetadata {
        let key_id = Uuid::new_v4().to_string();
        self.insert_key(region, &key_id, "", None)
    }

    fn insert_key(
        &self,
        region: &str,
        key_id: &str,
        description: &str,
        multi_region_key_type: Option<&str>,
    ) -> KeyMetadata {
        let arn = key_arn(region, &self.account_id, key_id);
        let meta = KeyMetadata {
            key_id: key_id.to_string(),
            arn: arn.clone(),
            description: description.to_string(),
            enabled: true,
            key_state: KEY_STATE_ENABLED.to_string(),
            key_spec: KEY_SPEC_SYMMETRIC_DEFAULT.to_string(),
            key_usage: KEY_USAGE_ENCRYPT_DECRYPT.to_string(),
            multi_region_key_type: multi_region_key_type.map(String::from),
            primary_key_arn: multi_region_key_type.map(|_| arn),
        };
        lock(&self.world).keys.insert(
            (region.to_string(), key_id.to_string()),
            StoredKey {
                meta: meta.clone(),
                policy: default_key_policy(&self.account_id),
                rotation_enabled: false,
                tags: TagMap::new(),
                pending_polls: 0,
            },
        );
        meta
    }

    /// Answer the next `calls` replications as if the primary key had not
    /// reached its own region's endpoint yet.
    pub fn hide_primary_for(&self, calls: u32) {
        lock(&self.world).hidden_primary_calls = calls;
    }

    /// Describes a new replica answers with `Creating` before it is enabled.
    pub fn set_creating_polls(&self, polls: u32) {
        lock(&self.world).creating_polls = polls;
    }

    /// Fail the next call of `operation` (e.g. `"PutKeyPolicy"`) with `err`.
    pub fn fail_next(&self, operation: &str, err: ProviderError) {
        self.faults.push(operation, err);
    }

    pub fn key(&self, region: &str, key_id: &str) -> Option<KeyMetadata> {
        lock(&self.world)
            .keys
            .get(&(region.to_string(), resolve_key_id(key_id)))
            .map(|k| k.meta.clone())
    }

    pub fn policy(&self, region: &str, key_id: &str) -> Option<String> {
        lock(&self.world)
            .keys
            .get(&(region.to_string(), resolve_key_id(key_id)))
            .map(|k| k.policy.clone())
    }

    pub fn tags(&self, region: &str, key_id: &str) -> Option<TagMap> {
        lock(&self.world)
            .keys
            .get(&(region.to_string(), resolve_key_id(key_id)))
            .map(|k| k.tags.clone())
    }

    fn call(&self, operation: &str) -> Result<(), ProviderError> {
        self.log.record(SERVICE, operation);
        match self.faults.take(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn not_found(&self, region: &str, key_id: &str) -> ProviderError {
        service_error(
            "NotFoundException",
            format!("Key '{}' does not exist", key_arn(region, &self.account_id, key_id)),
            RESOURCE_TYPE,
            key_id,
        )
    }

    /// Run `f` on the stored key, or fail with `NotFoundException`.
    fn with_key<T>(
        &self,
        region: &str,
        key: &str,
        f: impl FnOnce(&mut StoredKey) -> Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        let key_id = resolve_key_id(key);
        let mut world = lock(&self.world);
        match world.keys.get_mut(&(region.to_string(), key_id.clone())) {
            Some(stored) => f(stored),
            None => Err(self.not_found(region, &key_id)),
        }
    }

    fn replicate(
        &self,
        region: &str,
        input: &ReplicateKeyInput,
    ) -> Result<KeyMetadata, ProviderError> {
        let key_id = resolve_key_id(&input.primary_key_id);
        let mut world = lock(&self.world);

        if world.hidden_primary_calls > 0 {
            world.hidden_primary_calls -= 1;
            return Err(self.not_found(region, &key_id));
        }
        if input.replica_region == region {
            return Err(service_error(
                "ValidationException",
                "replica region must differ from the primary key's region",
                RESOURCE_TYPE,
                &key_id,
            ));
        }

        let primary = match world.keys.get(&(region.to_string(), key_id.clone())) {
            Some(k)
                if k.meta.multi_region_key_type.as_deref()
                    == Some(MULTI_REGION_KEY_TYPE_PRIMARY) =>
            {
                k.clone()
            }
            Some(_) => {
                return Err(service_error(
                    "UnsupportedOperationException",
                    format!("{key_id} is not a multi-Region primary key"),
                    RESOURCE_TYPE,
                    &key_id,
                ));
            }
            None => return Err(self.not_found(region, &key_id)),
        };

        let target = (input.replica_region.clone(), key_id.clone());
        if world.keys.contains_key(&target) {
            return Err(service_error(
                "AlreadyExistsException",
                format!("{key_id} already has a replica in {}", input.replica_region),
                RESOURCE_TYPE,
                &key_id,
            ));
        }
        if let Some(policy) = &input.policy {
            check_policy(policy, &key_id)?;
        }

        let meta = KeyMetadata {
            key_id: key_id.clone(),
            arn: key_arn(&input.replica_region, &self.account_id, &key_id),
            description: input.description.clone().unwrap_or_default(),
            enabled: false,
            key_state: KEY_STATE_CREATING.to_string(),
            key_spec: primary.meta.key_spec.clone(),
            key_usage: primary.meta.key_usage.clone(),
            multi_region_key_type: Some(MULTI_REGION_KEY_TYPE_REPLICA.to_string()),
            primary_key_arn: Some(primary.meta.arn.clone()),
        };
        let pending_polls = world.creating_polls;
        world.keys.insert(
            target,
            StoredKey {
                meta: meta.clone(),
                policy: input
                    .policy
                    .clone()
                    .unwrap_or_else(|| default_key_policy(&self.account_id)),
                rotation_enabled: primary.rotation_enabled,
                tags: input.tags.clone(),
                pending_polls,
            },
        );
        Ok(meta)
    }
}

fn check_policy(policy: &str, key_id: &str) -> Result<(), ProviderError> {
    serde_json::from_str::<serde_json::Value>(policy)
        .map(|_| ())
        .map_err(|e| {
            service_error(
                "MalformedPolicyDocumentException",
                format!("policy is not valid JSON: {e}"),
                RESOURCE_TYPE,
                key_id,
            )
        })
}

fn require_usable(stored: &StoredKey) -> Result<(), ProviderError> {
    if stored.meta.key_state == KEY_STATE_PENDING_DELETION {
        return Err(service_error(
            "KMSInvalidStateException",
            format!("{} is pending deletion", stored.meta.arn),
            RESOURCE_TYPE,
            &stored.meta.key_id,
        ));
    }
    Ok(())
}

/// One region's view of the [`KmsBackend`].
pub struct FakeKms {
    region: String,
    backend: Arc<KmsBackend>,
}

impl FakeKms {
    pub fn new(region: &str, backend: Arc<KmsBackend>) -> Self {
        Self {
            region: region.to_string(),
            backend,
        }
    }
}

impl Tagger for FakeKms {
    fn tag_resource<'a>(
        &'a self,
        identifier: &'a str,
        tags: &'a TagMap,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.backend.call("TagResource")?;
            self.backend.with_key(&self.region, identifier, |k| {
                require_usable(k)?;
                for (key, value) in tags.iter() {
                    k.tags.insert(key, value);
                }
                Ok(())
            })
        })
    }

    fn untag_resource<'a>(
        &'a self,
        identifier: &'a str,
        keys: &'a [String],
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.backend.call("UntagResource")?;
            self.backend.with_key(&self.region, identifier, |k| {
                require_usable(k)?;
                for key in keys {
                    k.tags.remove(key);
                }
                Ok(())
            })
        })
    }
}

impl KmsApi for FakeKms {
    fn describe_key<'a>(
        &'a self,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<KeyMetadata, ProviderError>> {
        Box::pin(async move {
            self.backend.call("DescribeKey")?;
            self.backend.with_key(&self.region, key_id, |k| {
                if k.meta.key_state == KEY_STATE_CREATING {
                    if k.pending_polls == 0 {
                        k.meta.key_state = KEY_STATE_ENABLED.to_string();
                        k.meta.enabled = true;
                    } else {
                        k.pending_polls -= 1;
                    }
                }
                Ok(k.meta.clone())
            })
        })
    }

    fn get_key_policy<'a>(
        &'a self,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            self.backend.call("GetKeyPolicy")?;
            self.backend
                .with_key(&self.region, key_id, |k| Ok(k.policy.clone()))
        })
    }

    fn get_key_rotation_status<'a>(
        &'a self,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, ProviderError>> {
        Box::pin(async move {
            self.backend.call("GetKeyRotationStatus")?;
            self.backend
                .with_key(&self.region, key_id, |k| Ok(k.rotation_enabled))
        })
    }

    fn list_resource_tags<'a>(
        &'a self,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<TagMap, ProviderError>> {
        Box::pin(async move {
            self.backend.call("ListResourceTags")?;
            self.backend.with_key(&self.region, key_id, |k| Ok(k.tags.clone()))
        })
    }

    fn replicate_key<'a>(
        &'a self,
        input: &'a ReplicateKeyInput,
    ) -> BoxFuture<'a, Result<KeyMetadata, ProviderError>> {
        Box::pin(async move {
            self.backend.call("ReplicateKey")?;
            self.backend.replicate(&self.region, input)
        })
    }

    fn update_key_description<'a>(
        &'a self,
        key_id: &'a str,
        description: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.backend.call("UpdateKeyDescription")?;
            self.backend.with_key(&self.region, key_id, |k| {
                require_usable(k)?;
                k.meta.description = description.to_string();
                Ok(())
            })
        })
    }

    fn enable_key<'a>(&'a self, key_id: &'a str) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.backend.call("EnableKey")?;
            self.backend.with_key(&self.region, key_id, |k| {
                require_usable(k)?;
                k.meta.key_state = KEY_STATE_ENABLED.to_string();
                k.meta.enabled = true;
                Ok(())
            })
        })
    }

    fn disable_key<'a>(&'a self, key_id: &'a str) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.backend.call("DisableKey")?;
            self.backend.with_key(&self.region, key_id, |k| {
                require_usable(k)?;
                k.meta.key_state = KEY_STATE_DISABLED.to_string();
                k.meta.enabled = false;
                Ok(())
            })
        })
    }

    fn put_key_policy<'a>(
        &'a self,
        key_id: &'a str,
        policy: &'a str,
        _bypass_policy_lockout_safety_check: bool,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.backend.call("PutKeyPolicy")?;
            self.backend.with_key(&self.region, key_id, |k| {
                require_usable(k)?;
                check_policy(policy, &k.meta.key_id)?;
                k.policy = policy.to_string();
                Ok(())
            })
        })
    }

    fn schedule_key_deletion<'a>(
        &'a self,
        key_id: &'a str,
        pending_window_in_days: i32,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.backend.call("ScheduleKeyDeletion")?;
            self.backend.with_key(&self.region, key_id, |k| {
                require_usable(k)?;
                if !(7..=30).contains(&pending_window_in_days) {
                    return Err(service_error(
                        "ValidationException",
                        format!(
                            "PendingWindowInDays must be between 7 and 30, \
                             got {pending_window_in_days}"
                        ),
                        RESOURCE_TYPE,
                        &k.meta.key_id,
                    ));
                }
                k.meta.key_state = KEY_STATE_PENDING_DELETION.to_string();
                k.meta.enabled = false;
                Ok(())
            })
        })
    }
}
