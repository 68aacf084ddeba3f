//! Tag reconciliation shared by every taggable resource.

use ferroform_core::attrs::Attributes;
use ferroform_core::schema::attr;
use ferroform_core::{IgnoreConfig, TagDiff, TagMap};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::handler::BoxFuture;
use crate::state::InstanceState;

/// Provider-specific batch tag / untag calls.
pub trait Tagger: Send + Sync {
    /// Add or overwrite `tags` on `identifier`.
    fn tag_resource<'a>(
        &'a self,
        identifier: &'a str,
        tags: &'a TagMap,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Remove `keys` from `identifier`.
    fn untag_resource<'a>(
        &'a self,
        identifier: &'a str,
        keys: &'a [String],
    ) -> BoxFuture<'a, Result<(), ProviderError>>;
}

/// Move the remote tag set of `identifier` from `remote` to `desired`.
///
/// Removals go first, then one combined add/update call. Ignored and
/// system keys are left alone on both sides. Identical sets issue no calls.
pub async fn update_tags<T: Tagger + ?Sized>(
    tagger: &T,
    identifier: &str,
    remote: &TagMap,
    desired: &TagMap,
    ignore: &IgnoreConfig,
) -> Result<TagDiff, ProviderError> {
    let diff = TagDiff::between(&remote.ignoring(ignore), &desired.ignoring(ignore));
    if diff.is_empty() {
        return Ok(diff);
    }

    if !diff.remove.is_empty() {
        tracing::debug!(identifier, keys = ?diff.remove, "removing tags");
        tagger.untag_resource(identifier, &diff.remove).await?;
    }

    let upserts = diff.upserts();
    if !upserts.is_empty() {
        tracing::debug!(
            identifier,
            added = diff.add.len(),
            updated = diff.update.len(),
            "tagging resource"
        );
        tagger.tag_resource(identifier, &upserts).await?;
    }

    Ok(diff)
}

/// Desired `tags_all` from already-prepared attributes.
pub fn desired_tags_all(desired: &Attributes) -> Result<TagMap, ProviderError> {
    let value = desired.get(attr::TAGS_ALL).cloned().unwrap_or_default();
    Ok(TagMap::from_value(attr::TAGS_ALL, &value)?)
}

/// `tags_all` as last recorded in state.
pub fn prior_tags_all(prior: &InstanceState) -> Result<TagMap, ProviderError> {
    let value = prior.get(attr::TAGS_ALL).cloned().unwrap_or_default();
    Ok(TagMap::from_value(attr::TAGS_ALL, &value)?)
}

/// Merge configured `tags` with provider default tags into `tags_all`.
pub fn merge_default_tags(
    config: &ProviderConfig,
    desired: &mut Attributes,
) -> Result<(), ProviderError> {
    let value = desired.get(attr::TAGS).cloned().unwrap_or_default();
    let tags = TagMap::from_value(attr::TAGS, &value)?;
    let all = tags.merge_defaults(&config.default_tags);
    desired.insert(attr::TAGS_ALL.into(), all.to_value());
    Ok(())
}

/// Write `tags_all` (remote, filtered) and `tags` (minus provider defaults)
/// into freshly read attributes.
pub fn set_read_tags(config: &ProviderConfig, attrs: &mut Attributes, remote: &TagMap) {
    let all = remote.ignoring(&config.ignore_tags);
    let own = all.without_defaults(&config.default_tags);
    attrs.insert(attr::TAGS.into(), own.to_value());
    attrs.insert(attr::TAGS_ALL.into(), all.to_value());
}

/// Put back configured `tags` entries that [`set_read_tags`] dropped
/// because they equal a provider default. A key the configuration sets
/// explicitly is owned by the resource even when the values agree.
pub fn keep_configured_tags(
    config: &ProviderConfig,
    configured: &Attributes,
    attrs: &mut Attributes,
) -> Result<(), ProviderError> {
    if config.default_tags.is_empty() || !attrs.contains_key(attr::TAGS) {
        return Ok(());
    }

    let wanted = configured.get(attr::TAGS).cloned().unwrap_or_default();
    let wanted = TagMap::from_value(attr::TAGS, &wanted)?;
    let all = attrs.get(attr::TAGS_ALL).cloned().unwrap_or_default();
    let all = TagMap::from_value(attr::TAGS_ALL, &all)?;
    let own = attrs.get(attr::TAGS).cloned().unwrap_or_default();
    let mut own = TagMap::from_value(attr::TAGS, &own)?;

    for (key, value) in all.iter() {
        if wanted.get(key) == Some(value) {
            own.insert(key, value);
        }
    }
    attrs.insert(attr::TAGS.into(), own.to_value());
    Ok(())
}
