use aws_sdk_kms::Client;
use aws_sdk_kms::types::Tag;
use ferroform_core::TagMap;

use crate::error::{ProviderError, from_sdk};
use crate::handler::BoxFuture;
use crate::tagging::Tagger;

use super::RESOURCE_TYPE;

pub const KEY_STATE_ENABLED: &str = "Enabled";
pub const KEY_STATE_DISABLED: &str = "Disabled";
pub const KEY_STATE_CREATING: &str = "Creating";
pub const KEY_STATE_PENDING_DELETION: &str = "PendingDeletion";
pub const KEY_STATE_PENDING_REPLICA_DELETION: &str = "PendingReplicaDeletion";

pub const MULTI_REGION_KEY_TYPE_PRIMARY: &str = "PRIMARY";
pub const MULTI_REGION_KEY_TYPE_REPLICA: &str = "REPLICA";

/// The slice of KMS key metadata the provider uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMetadata {
    pub key_id: String,
    pub arn: String,
    pub description: String,
    pub enabled: bool,
    pub key_state: String,
    pub key_spec: String,
    pub key_usage: String,
    pub multi_region_key_type: Option<String>,
    pub primary_key_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicateKeyInput {
    /// Key id or ARN of the multi-Region primary.
    pub primary_key_id: String,
    pub replica_region: String,
    pub description: Option<String>,
    pub policy: Option<String>,
    pub bypass_policy_lockout_safety_check: bool,
    pub tags: TagMap,
}

/// KMS control-plane calls, for one region.
pub trait KmsApi: Tagger {
    fn describe_key<'a>(
        &'a self,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<KeyMetadata, ProviderError>>;

    fn get_key_policy<'a>(
        &'a self,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<String, ProviderError>>;

    fn get_key_rotation_status<'a>(
        &'a self,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, ProviderError>>;

    fn list_resource_tags<'a>(
        &'a self,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<TagMap, ProviderError>>;

    /// Issued against the primary key's region.
    fn replicate_key<'a>(
        &'a self,
        input: &'a ReplicateKeyInput,
    ) -> BoxFuture<'a, Result<KeyMetadata, ProviderError>>;

    fn update_key_description<'a>(
        &'a self,
        key_id: &'a str,
        description: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    fn enable_key<'a>(&'a self, key_id: &'a str) -> BoxFuture<'a, Result<(), ProviderError>>;

    fn disable_key<'a>(&'a self, key_id: &'a str) -> BoxFuture<'a, Result<(), ProviderError>>;

    fn put_key_policy<'a>(
        &'a self,
        key_id: &'a str,
        policy: &'a str,
        bypass_policy_lockout_safety_check: bool,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    fn schedule_key_deletion<'a>(
        &'a self,
        key_id: &'a str,
        pending_window_in_days: i32,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;
}

/// KMS through the AWS SDK.
pub struct AwsKms {
    client: Client,
}

impl AwsKms {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

// Accessors are normalised through `Option` so required and optional model
// members read the same way.
fn convert_metadata(meta: &aws_sdk_kms::types::KeyMetadata) -> KeyMetadata {
    let key_id: Option<&str> = meta.key_id().into();
    let arn: Option<&str> = meta.arn().into();
    let description: Option<&str> = meta.description().into();
    let enabled: Option<bool> = meta.enabled().into();
    let key_state: Option<&aws_sdk_kms::types::KeyState> = meta.key_state().into();
    let key_spec: Option<&aws_sdk_kms::types::KeySpec> = meta.key_spec().into();
    let key_usage: Option<&aws_sdk_kms::types::KeyUsageType> = meta.key_usage().into();

    let multi_region = meta.multi_region_configuration();
    let multi_region_key_type = multi_region
        .and_then(|m| m.multi_region_key_type())
        .map(|t| t.as_str().to_string());
    let primary_key_arn = multi_region
        .and_then(|m| m.primary_key())
        .and_then(|p| p.arn())
        .map(String::from);

    KeyMetadata {
        key_id: key_id.unwrap_or_default().to_string(),
        arn: arn.unwrap_or_default().to_string(),
        description: description.unwrap_or_default().to_string(),
        enabled: enabled.unwrap_or(false),
        key_state: key_state.map(|s| s.as_str().to_string()).unwrap_or_default(),
        key_spec: key_spec.map(|s| s.as_str().to_string()).unwrap_or_default(),
        key_usage: key_usage.map(|s| s.as_str().to_string()).unwrap_or_default(),
        multi_region_key_type,
        primary_key_arn,
    }
}

fn to_sdk_tags(tags: &TagMap) -> Result<Vec<Tag>, ProviderError> {
    tags.iter()
        .map(|(k, v)| {
            Tag::builder()
                .tag_key(k)
                .tag_value(v)
                .build()
                .map_err(|e| ProviderError::Validation(format!("invalid tag {k:?}: {e}")))
        })
        .collect()
}

impl Tagger for AwsKms {
    fn tag_resource<'a>(
        &'a self,
        identifier: &'a str,
        tags: &'a TagMap,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .tag_resource()
                .key_id(identifier)
                .set_tags(Some(to_sdk_tags(tags)?))
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, identifier))?;
            Ok(())
        })
    }

    fn untag_resource<'a>(
        &'a self,
        identifier: &'a str,
        keys: &'a [String],
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .untag_resource()
                .key_id(identifier)
                .set_tag_keys(Some(keys.to_vec()))
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, identifier))?;
            Ok(())
        })
    }
}

impl KmsApi for AwsKms {
    fn describe_key<'a>(
        &'a self,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<KeyMetadata, ProviderError>> {
        Box::pin(async move {
            let resp = self
                .client
                .describe_key()
                .key_id(key_id)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, key_id))?;

            resp.key_metadata()
                .map(convert_metadata)
                .ok_or_else(|| ProviderError::not_found(RESOURCE_TYPE, key_id))
        })
    }

    fn get_key_policy<'a>(
        &'a self,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get_key_policy()
                .key_id(key_id)
                .policy_name("default")
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, key_id))?;

            let policy: Option<&str> = resp.policy().into();
            Ok(policy.unwrap_or_default().to_string())
        })
    }

    fn get_key_rotation_status<'a>(
        &'a self,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, ProviderError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get_key_rotation_status()
                .key_id(key_id)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, key_id))?;

            let enabled: Option<bool> = resp.key_rotation_enabled().into();
            Ok(enabled.unwrap_or(false))
        })
    }

    fn list_resource_tags<'a>(
        &'a self,
        key_id: &'a str,
    ) -> BoxFuture<'a, Result<TagMap, ProviderError>> {
        Box::pin(async move {
            let mut tags = TagMap::new();
            let mut marker: Option<String> = None;

            loop {
                let resp = self
                    .client
                    .list_resource_tags()
                    .key_id(key_id)
                    .set_marker(marker.take())
                    .send()
                    .await
                    .map_err(|e| from_sdk(e, RESOURCE_TYPE, key_id))?;

                for tag in resp.tags() {
                    let key: Option<&str> = tag.tag_key().into();
                    let value: Option<&str> = tag.tag_value().into();
                    if let Some(key) = key {
                        tags.insert(key, value.unwrap_or_default());
                    }
                }

                match resp.next_marker() {
                    Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                    _ => break,
                }
            }

            Ok(tags)
        })
    }

    fn replicate_key<'a>(
        &'a self,
        input: &'a ReplicateKeyInput,
    ) -> BoxFuture<'a, Result<KeyMetadata, ProviderError>> {
        Box::pin(async move {
            let tags = to_sdk_tags(&input.tags)?;
            let resp = self
                .client
                .replicate_key()
                .key_id(&input.primary_key_id)
                .replica_region(&input.replica_region)
                .set_description(input.description.clone())
                .set_policy(input.policy.clone())
                .bypass_policy_lockout_safety_check(input.bypass_policy_lockout_safety_check)
                .set_tags((!tags.is_empty()).then_some(tags))
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, &input.primary_key_id))?;

            resp.replica_key_metadata()
                .map(convert_metadata)
                .ok_or_else(|| {
                    ProviderError::Fatal("ReplicateKey returned no replica key metadata".into())
                })
        })
    }

    fn update_key_description<'a>(
        &'a self,
        key_id: &'a str,
        description: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .update_key_description()
                .key_id(key_id)
                .description(description)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, key_id))?;
            Ok(())
        })
    }

    fn enable_key<'a>(&'a self, key_id: &'a str) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .enable_key()
                .key_id(key_id)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, key_id))?;
            Ok(())
        })
    }

    fn disable_key<'a>(&'a self, key_id: &'a str) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .disable_key()
                .key_id(key_id)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, key_id))?;
            Ok(())
        })
    }

    fn put_key_policy<'a>(
        &'a self,
        key_id: &'a str,
        policy: &'a str,
        bypass_policy_lockout_safety_check: bool,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .put_key_policy()
                .key_id(key_id)
                .policy_name("default")
                .policy(policy)
                .bypass_policy_lockout_safety_check(bypass_policy_lockout_safety_check)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, key_id))?;
            Ok(())
        })
    }

    fn schedule_key_deletion<'a>(
        &'a self,
        key_id: &'a str,
        pending_window_in_days: i32,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .schedule_key_deletion()
                .key_id(key_id)
                .pending_window_in_days(pending_window_in_days)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, key_id))?;
            Ok(())
        })
    }
}
