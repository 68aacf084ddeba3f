//! `aws_kms_replica_key`: a multi-Region replica of a KMS key living in
//! another region.
//!
//! The replica is created by calling `ReplicateKey` on the *primary* key's
//! region with the provider region as the target, so create talks to two
//! regional KMS endpoints. Everything after that (reads, updates, deletion)
//! goes to the provider region.

use std::time::Duration;

use ferroform_core::attrs::{self, Attributes};
use ferroform_core::schema::{AttrType, Attribute, Compare, DefaultValue, Delta, attr};
use ferroform_core::{Arn, Schema};
use serde_json::{Value, json};

use crate::conns::ProviderMeta;
use crate::context::OperationContext;
use crate::error::ProviderError;
use crate::handler::{BoxFuture, ResourceHandler, UpdateProgress, incomplete_create};
use crate::retry::{WaitStatus, wait_until, with_retry};
use crate::state::InstanceState;
use crate::tagging::{desired_tags_all, prior_tags_all, set_read_tags, update_tags};

use super::RESOURCE_TYPE;
use super::api::{KEY_STATE_DISABLED, KEY_STATE_ENABLED, KmsApi, ReplicateKeyInput};
use super::finder::{find_key_by_id, find_replica_key_by_id};

pub const PRIMARY_KEY_ARN: &str = "primary_key_arn";
pub const BYPASS_POLICY_LOCKOUT_SAFETY_CHECK: &str = "bypass_policy_lockout_safety_check";
pub const DELETION_WINDOW_IN_DAYS: &str = "deletion_window_in_days";
pub const KEY_ID: &str = "key_id";
pub const KEY_ROTATION_ENABLED: &str = "key_rotation_enabled";
pub const KEY_SPEC: &str = "key_spec";
pub const KEY_USAGE: &str = "key_usage";

const DEFAULT_DELETION_WINDOW_IN_DAYS: i64 = 30;

pub static SCHEMA: Schema = Schema {
    type_name: RESOURCE_TYPE,
    attributes: &[
        Attribute::required(PRIMARY_KEY_ARN, AttrType::String)
            .label("Primary key ARN")
            .force_new()
            .validate_with(validate_primary_key_arn),
        Attribute::optional(attr::DESCRIPTION, AttrType::String)
            .label("Description")
            .default_value(DefaultValue::Str(""))
            .validate_with(validate_description),
        Attribute::optional(attr::ENABLED, AttrType::Bool)
            .label("Enabled")
            .default_value(DefaultValue::Bool(true)),
        Attribute::optional_computed(attr::POLICY, AttrType::String)
            .label("Key policy")
            .compare(Compare::Json)
            .validate_with(validate_policy),
        Attribute::optional(BYPASS_POLICY_LOCKOUT_SAFETY_CHECK, AttrType::Bool)
            .label("Bypass policy lockout safety check")
            .default_value(DefaultValue::Bool(false))
            .not_importable(),
        Attribute::optional(DELETION_WINDOW_IN_DAYS, AttrType::Int)
            .label("Deletion window (days)")
            .default_value(DefaultValue::Int(DEFAULT_DELETION_WINDOW_IN_DAYS))
            .not_importable()
            .validate_with(validate_deletion_window),
        Attribute::tags(),
        Attribute::tags_all(),
        Attribute::computed(attr::ARN, AttrType::String).label("ARN"),
        Attribute::computed(KEY_ID, AttrType::String).label("Key ID"),
        Attribute::computed(KEY_ROTATION_ENABLED, AttrType::Bool).label("Key rotation enabled"),
        Attribute::computed(KEY_SPEC, AttrType::String).label("Key spec"),
        Attribute::computed(KEY_USAGE, AttrType::String).label("Key usage"),
    ],
};

fn validate_primary_key_arn(value: &Value) -> Result<(), String> {
    let s = value.as_str().unwrap_or_default();
    let arn: Arn = s.parse().map_err(|e: ferroform_core::CoreError| e.to_string())?;
    if arn.service != "kms" || !arn.resource.starts_with("key/") {
        return Err(format!("{s:?} is not a KMS key ARN"));
    }
    if arn.region.is_empty() {
        return Err(format!("{s:?} has no region"));
    }
    Ok(())
}

fn validate_description(value: &Value) -> Result<(), String> {
    match value.as_str() {
        Some(s) if s.len() > 8192 => Err("must be at most 8192 characters".into()),
        _ => Ok(()),
    }
}

fn validate_policy(value: &Value) -> Result<(), String> {
    let s = value.as_str().unwrap_or_default();
    serde_json::from_str::<Value>(s)
        .map(|_| ())
        .map_err(|e| format!("not valid JSON: {e}"))
}

fn validate_deletion_window(value: &Value) -> Result<(), String> {
    match value.as_i64() {
        Some(7..=30) => Ok(()),
        _ => Err(format!("must be between 7 and 30 days, got {value}")),
    }
}

fn policies_equivalent(a: &str, b: &str) -> bool {
    match (
        serde_json::from_str::<Value>(a),
        serde_json::from_str::<Value>(b),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

pub struct ReplicaKeyHandler;

impl ReplicaKeyHandler {
    async fn wait_enabled_state(
        ctx: &OperationContext,
        kms: &dyn KmsApi,
        key_id: &str,
        enabled: bool,
        timeout: Duration,
        interval: Duration,
    ) -> Result<(), ProviderError> {
        let target = if enabled {
            KEY_STATE_ENABLED
        } else {
            KEY_STATE_DISABLED
        };
        wait_until(ctx, "replica key state", timeout, interval, move || async move {
            match find_key_by_id(kms, key_id).await {
                Ok(key) if key.key_state == target && key.enabled == enabled => {
                    Ok(WaitStatus::Done(()))
                }
                Ok(key) => Ok(WaitStatus::Pending(key.key_state)),
                Err(e) if e.is_not_found() => Ok(WaitStatus::Pending("not yet visible".into())),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn set_enabled(
        ctx: &OperationContext,
        meta: &ProviderMeta,
        kms: &dyn KmsApi,
        key_id: &str,
        enabled: bool,
    ) -> Result<(), ProviderError> {
        let timeouts = &meta.config.timeouts;
        with_retry(
            ctx,
            &meta.config.retry,
            timeouts.update(),
            "toggle replica key",
            move || async move {
                if enabled {
                    kms.enable_key(key_id).await
                } else {
                    kms.disable_key(key_id).await
                }
            },
        )
        .await?;

        tracing::debug!(key_id, enabled, "replica key enabled state changed");
        Self::wait_enabled_state(
            ctx,
            kms,
            key_id,
            enabled,
            timeouts.update(),
            timeouts.poll_interval(),
        )
        .await
    }

    async fn set_description(
        ctx: &OperationContext,
        meta: &ProviderMeta,
        kms: &dyn KmsApi,
        key_id: &str,
        description: &str,
    ) -> Result<(), ProviderError> {
        let timeouts = &meta.config.timeouts;
        with_retry(ctx, &meta.config.retry, timeouts.update(), "update key description", move || {
            kms.update_key_description(key_id, description)
        })
        .await?;

        wait_until(
            ctx,
            "key description propagation",
            timeouts.propagation(),
            timeouts.poll_interval(),
            move || async move {
                let key = find_key_by_id(kms, key_id).await?;
                if key.description == description {
                    Ok(WaitStatus::Done(()))
                } else {
                    Ok(WaitStatus::Pending(format!("description {:?}", key.description)))
                }
            },
        )
        .await
    }

    async fn set_policy(
        ctx: &OperationContext,
        meta: &ProviderMeta,
        kms: &dyn KmsApi,
        key_id: &str,
        policy: &str,
        bypass: bool,
    ) -> Result<(), ProviderError> {
        let timeouts = &meta.config.timeouts;
        with_retry(ctx, &meta.config.retry, timeouts.update(), "put key policy", move || {
            kms.put_key_policy(key_id, policy, bypass)
        })
        .await?;

        wait_until(
            ctx,
            "key policy propagation",
            timeouts.propagation(),
            timeouts.poll_interval(),
            move || async move {
                let remote = kms.get_key_policy(key_id).await?;
                if policies_equivalent(&remote, policy) {
                    Ok(WaitStatus::Done(()))
                } else {
                    Ok(WaitStatus::Pending("policy not yet propagated".into()))
                }
            },
        )
        .await
    }

    /// Refresh state, failing if the key vanished underneath us.
    async fn refresh(
        &self,
        ctx: &OperationContext,
        meta: &ProviderMeta,
        key_id: &str,
    ) -> Result<InstanceState, ProviderError> {
        self.read(ctx, meta, key_id)
            .await?
            .ok_or_else(|| ProviderError::not_found(RESOURCE_TYPE, key_id))
    }
}

impl ResourceHandler for ReplicaKeyHandler {
    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn create<'a>(
        &'a self,
        ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        desired: &'a Attributes,
    ) -> BoxFuture<'a, Result<InstanceState, ProviderError>> {
        Box::pin(async move {
            let primary_key_arn = attrs::get_str(desired, PRIMARY_KEY_ARN).ok_or_else(|| {
                ProviderError::Validation(format!("{PRIMARY_KEY_ARN} is required"))
            })?;
            let primary: Arn = primary_key_arn.parse()?;
            let replica_region = meta.config.region.clone();

            let input = ReplicateKeyInput {
                primary_key_id: primary_key_arn.to_string(),
                replica_region: replica_region.clone(),
                description: attrs::get_non_empty_str(desired, attr::DESCRIPTION).map(String::from),
                policy: attrs::get_non_empty_str(desired, attr::POLICY).map(String::from),
                bypass_policy_lockout_safety_check: attrs::get_bool(
                    desired,
                    BYPASS_POLICY_LOCKOUT_SAFETY_CHECK,
                )
                .unwrap_or(false),
                tags: desired_tags_all(desired)?.ignoring(&meta.config.ignore_tags),
            };

            tracing::debug!(
                primary_key_arn,
                primary_region = %primary.region,
                replica_region = %replica_region,
                "replicating KMS key"
            );

            // Replication goes through the primary's region. The primary may
            // not be visible there yet; keep trying while it propagates.
            let primary_kms = meta.conns.kms(&primary.region);
            let primary_kms: &dyn KmsApi = primary_kms.as_ref();
            let primary_region = primary.region.as_str();
            let input = &input;
            let timeouts = &meta.config.timeouts;
            let replica = with_retry(
                ctx,
                &meta.config.retry,
                timeouts.propagation(),
                "replicate KMS key",
                move || async move {
                    primary_kms.replicate_key(input).await.map_err(|e| match e {
                        ProviderError::NotFound { .. } => ProviderError::Conflict(format!(
                            "primary key {primary_key_arn} not yet visible in {primary_region}"
                        )),
                        other => other,
                    })
                },
            )
            .await?;

            let key_id = replica.key_id.as_str();
            let kms = meta.kms();
            let settle = async {
                Self::wait_enabled_state(
                    ctx,
                    kms.as_ref(),
                    key_id,
                    true,
                    timeouts.create(),
                    timeouts.poll_interval(),
                )
                .await?;

                if attrs::get_bool(desired, attr::ENABLED) == Some(false) {
                    Self::set_enabled(ctx, meta, kms.as_ref(), key_id, false).await?;
                }
                self.refresh(ctx, meta, key_id).await
            };

            match settle.await {
                Ok(state) => {
                    tracing::info!(key_id, replica_region = %replica_region, "replica key created");
                    Ok(state)
                }
                Err(e) => {
                    let known = Attributes::from_iter([
                        (attr::ARN.to_string(), json!(replica.arn)),
                        (KEY_ID.to_string(), json!(replica.key_id)),
                    ]);
                    Err(incomplete_create(RESOURCE_TYPE, key_id, desired, known, e))
                }
            }
        })
    }

    fn read<'a>(
        &'a self,
        _ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<InstanceState>, ProviderError>> {
        Box::pin(async move {
            let kms = meta.kms();
            let key = match find_replica_key_by_id(kms.as_ref(), id).await {
                Ok(key) => key,
                Err(e) if e.is_not_found() => {
                    tracing::warn!(key_id = id, "replica key not found, removing from state");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };

            let policy = kms.get_key_policy(id).await?;
            let rotation = kms.get_key_rotation_status(id).await?;
            let tags = kms.list_resource_tags(id).await?;

            let mut attributes = Attributes::new();
            attributes.insert(attr::ARN.into(), json!(key.arn));
            attributes.insert(attr::DESCRIPTION.into(), json!(key.description));
            attributes.insert(attr::ENABLED.into(), json!(key.enabled));
            attributes.insert(KEY_ID.into(), json!(key.key_id));
            attributes.insert(KEY_ROTATION_ENABLED.into(), json!(rotation));
            attributes.insert(KEY_SPEC.into(), json!(key.key_spec));
            attributes.insert(KEY_USAGE.into(), json!(key.key_usage));
            attributes.insert(PRIMARY_KEY_ARN.into(), json!(key.primary_key_arn));
            attributes.insert(attr::POLICY.into(), json!(policy));
            set_read_tags(&meta.config, &mut attributes, &tags);

            Ok(Some(InstanceState::new(RESOURCE_TYPE, key.key_id, attributes)))
        })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        prior: &'a InstanceState,
        desired: &'a Attributes,
        delta: &'a Delta,
    ) -> BoxFuture<'a, Result<InstanceState, ProviderError>> {
        Box::pin(async move {
            let kms = meta.kms();
            let key_id = prior.id.as_str();
            let enabled = attrs::get_bool(desired, attr::ENABLED).unwrap_or(true);
            let mut progress = UpdateProgress::new(prior, desired);

            // Configuration-only attributes have nothing to call.
            for field in [BYPASS_POLICY_LOCKOUT_SAFETY_CHECK, DELETION_WINDOW_IN_DAYS] {
                if delta.has_change(field) {
                    progress.applied(field);
                }
            }

            if delta.has_change(attr::ENABLED) && enabled {
                if let Err(e) = Self::set_enabled(ctx, meta, kms.as_ref(), key_id, true).await {
                    return Err(progress.fail(attr::ENABLED, e));
                }
                progress.applied(attr::ENABLED);
            }

            if delta.has_change(attr::DESCRIPTION) {
                let description = attrs::get_str(desired, attr::DESCRIPTION).unwrap_or_default();
                if let Err(e) =
                    Self::set_description(ctx, meta, kms.as_ref(), key_id, description).await
                {
                    return Err(progress.fail(attr::DESCRIPTION, e));
                }
                progress.applied(attr::DESCRIPTION);
            }

            if delta.has_change(attr::POLICY)
                && let Some(policy) = attrs::get_non_empty_str(desired, attr::POLICY)
            {
                let bypass =
                    attrs::get_bool(desired, BYPASS_POLICY_LOCKOUT_SAFETY_CHECK).unwrap_or(false);
                if let Err(e) =
                    Self::set_policy(ctx, meta, kms.as_ref(), key_id, policy, bypass).await
                {
                    return Err(progress.fail(attr::POLICY, e));
                }
                progress.applied(attr::POLICY);
            }

            // Disable last so description and policy changes land on an
            // enabled key.
            if delta.has_change(attr::ENABLED) && !enabled {
                if let Err(e) = Self::set_enabled(ctx, meta, kms.as_ref(), key_id, false).await {
                    return Err(progress.fail(attr::ENABLED, e));
                }
                progress.applied(attr::ENABLED);
            }

            if delta.has_change(attr::TAGS_ALL) {
                let remote = prior_tags_all(prior)?;
                let wanted = desired_tags_all(desired)?;
                if let Err(e) =
                    update_tags(kms.as_ref(), key_id, &remote, &wanted, &meta.config.ignore_tags)
                        .await
                {
                    return Err(progress.fail(attr::TAGS_ALL, e));
                }
                progress.applied(attr::TAGS_ALL);
            }

            tracing::info!(key_id, changed = ?progress.applied_fields(), "replica key updated");
            self.refresh(ctx, meta, key_id).await
        })
    }

    fn delete<'a>(
        &'a self,
        ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        state: &'a InstanceState,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let kms = meta.kms();
            let kms: &dyn KmsApi = kms.as_ref();
            let key_id = state.id.as_str();
            let window = state
                .get_i64(DELETION_WINDOW_IN_DAYS)
                .unwrap_or(DEFAULT_DELETION_WINDOW_IN_DAYS);
            let window = i32::try_from(window).map_err(|_| {
                ProviderError::Validation(format!(
                    "{DELETION_WINDOW_IN_DAYS} out of range: {window}"
                ))
            })?;

            let timeouts = &meta.config.timeouts;
            let scheduled = with_retry(
                ctx,
                &meta.config.retry,
                timeouts.delete(),
                "schedule key deletion",
                move || async move {
                    // A key already pending deletion is as good as gone.
                    kms.schedule_key_deletion(key_id, window).await.map_err(|e| match e {
                        ProviderError::Conflict(msg) if msg.contains("is pending deletion") => {
                            ProviderError::not_found(RESOURCE_TYPE, key_id)
                        }
                        other => other,
                    })
                },
            )
            .await;

            match scheduled {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!(key_id, "replica key already gone");
                    return Ok(());
                }
                Err(e) => match find_key_by_id(kms, key_id).await {
                    Err(lookup) if lookup.is_not_found() => return Ok(()),
                    _ => return Err(e),
                },
            }

            wait_until(
                ctx,
                "replica key deletion",
                timeouts.delete(),
                timeouts.poll_interval(),
                move || async move {
                    match find_key_by_id(kms, key_id).await {
                        Err(e) if e.is_not_found() => Ok(WaitStatus::Done(())),
                        Ok(key) => Ok(WaitStatus::Pending(key.key_state)),
                        Err(e) => Err(e),
                    }
                },
            )
            .await?;

            tracing::info!(
                key_id,
                pending_window_in_days = window,
                "replica key scheduled for deletion"
            );
            Ok(())
        })
    }
}
