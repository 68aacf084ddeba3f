use crate::error::ProviderError;

use super::RESOURCE_TYPE;
use super::api::{
    KEY_STATE_PENDING_DELETION, KEY_STATE_PENDING_REPLICA_DELETION, KeyMetadata, KmsApi,
    MULTI_REGION_KEY_TYPE_REPLICA,
};

/// Describe `key_id`, treating a key scheduled for deletion as gone.
pub async fn find_key_by_id(api: &dyn KmsApi, key_id: &str) -> Result<KeyMetadata, ProviderError> {
    let key = api.describe_key(key_id).await?;

    if key.key_state == KEY_STATE_PENDING_DELETION
        || key.key_state == KEY_STATE_PENDING_REPLICA_DELETION
    {
        return Err(ProviderError::not_found(RESOURCE_TYPE, key_id));
    }

    Ok(key)
}

/// Like [`find_key_by_id`], but the key must be a multi-Region replica.
pub async fn find_replica_key_by_id(
    api: &dyn KmsApi,
    key_id: &str,
) -> Result<KeyMetadata, ProviderError> {
    let key = find_key_by_id(api, key_id).await?;

    match key.multi_region_key_type.as_deref() {
        Some(MULTI_REGION_KEY_TYPE_REPLICA) => Ok(key),
        other => Err(ProviderError::Fatal(format!(
            "KMS key {key_id} is not a multi-Region replica key (type {})",
            other.unwrap_or("single-Region")
        ))),
    }
}
