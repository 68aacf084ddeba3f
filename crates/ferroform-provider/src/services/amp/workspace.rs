//! `aws_prometheus_workspace`.
//!
//! Creation and alias changes are asynchronous: the workspace passes
//! through `CREATING` / `UPDATING` before it is `ACTIVE` again. Tags are
//! managed by ARN through the shared tagging helper.

use ferroform_core::attrs::{self, Attributes};
use ferroform_core::schema::{AttrType, Attribute, Delta, attr};
use ferroform_core::Schema;
use serde_json::{Value, json};

use crate::conns::ProviderMeta;
use crate::context::OperationContext;
use crate::error::ProviderError;
use crate::handler::{BoxFuture, ResourceHandler, UpdateProgress, incomplete_create};
use crate::retry::{WaitStatus, wait_until, with_retry};
use crate::state::InstanceState;
use crate::tagging::{desired_tags_all, prior_tags_all, set_read_tags, update_tags};

use super::RESOURCE_TYPE;
use super::api::{AmpApi, CreateWorkspaceInput, STATUS_ACTIVE, STATUS_CREATION_FAILED, Workspace};
use super::finder::find_workspace_by_id;

pub const ALIAS: &str = "alias";
pub const KMS_KEY_ARN: &str = "kms_key_arn";
pub const PROMETHEUS_ENDPOINT: &str = "prometheus_endpoint";

pub static SCHEMA: Schema = Schema {
    type_name: RESOURCE_TYPE,
    attributes: &[
        Attribute::optional(ALIAS, AttrType::String)
            .label("Alias")
            .validate_with(validate_alias),
        Attribute::optional(KMS_KEY_ARN, AttrType::String)
            .label("KMS key ARN")
            .force_new(),
        Attribute::tags(),
        Attribute::tags_all(),
        Attribute::computed(attr::ARN, AttrType::String).label("ARN"),
        Attribute::computed(PROMETHEUS_ENDPOINT, AttrType::String).label("Prometheus endpoint"),
    ],
};

fn validate_alias(value: &Value) -> Result<(), String> {
    let len = value.as_str().map(|s| s.chars().count()).unwrap_or_default();
    if (1..=100).contains(&len) {
        Ok(())
    } else {
        Err(format!("must be 1 to 100 characters, got {len}"))
    }
}

pub struct WorkspaceHandler;

impl WorkspaceHandler {
    async fn wait_active(
        ctx: &OperationContext,
        meta: &ProviderMeta,
        api: &dyn AmpApi,
        workspace_id: &str,
        timeout: std::time::Duration,
    ) -> Result<Workspace, ProviderError> {
        wait_until(
            ctx,
            "workspace to become active",
            timeout,
            meta.config.timeouts.poll_interval(),
            move || async move {
                let ws = find_workspace_by_id(api, workspace_id).await?;
                match ws.status.as_str() {
                    STATUS_ACTIVE => Ok(WaitStatus::Done(ws)),
                    STATUS_CREATION_FAILED => Err(ProviderError::Fatal(format!(
                        "workspace {workspace_id} creation failed"
                    ))),
                    other => Ok(WaitStatus::Pending(other.to_string())),
                }
            },
        )
        .await
    }

    async fn refresh(
        &self,
        ctx: &OperationContext,
        meta: &ProviderMeta,
        workspace_id: &str,
    ) -> Result<InstanceState, ProviderError> {
        self.read(ctx, meta, workspace_id)
            .await?
            .ok_or_else(|| ProviderError::not_found(RESOURCE_TYPE, workspace_id))
    }
}

impl ResourceHandler for WorkspaceHandler {
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
            let api = meta.conns.amp();
            let api: &dyn AmpApi = api.as_ref();

            let input = CreateWorkspaceInput {
                alias: attrs::get_non_empty_str(desired, ALIAS).map(String::from),
                kms_key_arn: attrs::get_non_empty_str(desired, KMS_KEY_ARN).map(String::from),
                tags: desired_tags_all(desired)?.ignoring(&meta.config.ignore_tags),
            };
            let input = &input;

            let workspace_id = with_retry(
                ctx,
                &meta.config.retry,
                meta.config.timeouts.create(),
                "create workspace",
                move || api.create_workspace(input),
            )
            .await?;

            let settle = async {
                Self::wait_active(ctx, meta, api, &workspace_id, meta.config.timeouts.create())
                    .await?;
                self.refresh(ctx, meta, &workspace_id).await
            };

            match settle.await {
                Ok(state) => {
                    tracing::info!(workspace_id = %workspace_id, "prometheus workspace created");
                    Ok(state)
                }
                Err(e) => Err(incomplete_create(
                    RESOURCE_TYPE,
                    &workspace_id,
                    desired,
                    Attributes::new(),
                    e,
                )),
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
            let api = meta.conns.amp();
            let ws = match find_workspace_by_id(api.as_ref(), id).await {
                Ok(ws) => ws,
                Err(e) if e.is_not_found() => {
                    tracing::warn!(workspace_id = id, "workspace not found, removing from state");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            let tags = api.list_tags_for_resource(&ws.arn).await?;

            let mut attributes = Attributes::new();
            attributes.insert(ALIAS.into(), json!(ws.alias));
            attributes.insert(attr::ARN.into(), json!(ws.arn));
            attributes.insert(KMS_KEY_ARN.into(), json!(ws.kms_key_arn));
            attributes.insert(PROMETHEUS_ENDPOINT.into(), json!(ws.prometheus_endpoint));
            set_read_tags(&meta.config, &mut attributes, &tags);

            Ok(Some(InstanceState::new(RESOURCE_TYPE, ws.workspace_id, attributes)))
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
            let api = meta.conns.amp();
            let api: &dyn AmpApi = api.as_ref();
            let workspace_id = prior.id.as_str();
            let mut progress = UpdateProgress::new(prior, desired);

            if delta.has_change(ALIAS) {
                let alias = attrs::get_non_empty_str(desired, ALIAS);
                let result = async {
                    with_retry(
                        ctx,
                        &meta.config.retry,
                        meta.config.timeouts.update(),
                        "update workspace alias",
                        move || api.update_workspace_alias(workspace_id, alias),
                    )
                    .await?;
                    Self::wait_active(ctx, meta, api, workspace_id, meta.config.timeouts.update())
                        .await
                }
                .await;
                if let Err(e) = result {
                    return Err(progress.fail(ALIAS, e));
                }
                progress.applied(ALIAS);
            }

            if delta.has_change(attr::TAGS_ALL) {
                let arn = prior.get_str(attr::ARN).unwrap_or_default();
                let remote = prior_tags_all(prior)?;
                let wanted = desired_tags_all(desired)?;
                if let Err(e) =
                    update_tags(api, arn, &remote, &wanted, &meta.config.ignore_tags).await
                {
                    return Err(progress.fail(attr::TAGS_ALL, e));
                }
                progress.applied(attr::TAGS_ALL);
            }

            tracing::info!(
                workspace_id,
                changed = ?progress.applied_fields(),
                "prometheus workspace updated"
            );
            self.refresh(ctx, meta, workspace_id).await
        })
    }

    fn delete<'a>(
        &'a self,
        ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        state: &'a InstanceState,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let api = meta.conns.amp();
            let api: &dyn AmpApi = api.as_ref();
            let workspace_id = state.id.as_str();
            let timeouts = &meta.config.timeouts;

            let result = with_retry(
                ctx,
                &meta.config.retry,
                timeouts.delete(),
                "delete workspace",
                move || api.delete_workspace(workspace_id),
            )
            .await;
            match result {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!(workspace_id, "workspace already gone");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }

            wait_until(
                ctx,
                "workspace deletion",
                timeouts.delete(),
                timeouts.poll_interval(),
                move || async move {
                    match find_workspace_by_id(api, workspace_id).await {
                        Ok(ws) => Ok(WaitStatus::Pending(ws.status)),
                        Err(e) if e.is_not_found() => Ok(WaitStatus::Done(())),
                        Err(e) => Err(e),
                    }
                },
            )
            .await?;

            tracing::info!(workspace_id, "prometheus workspace deleted");
            Ok(())
        })
    }
}
