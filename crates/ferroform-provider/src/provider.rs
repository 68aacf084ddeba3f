use std::sync::Arc;

use ferroform_core::Schema;
use ferroform_core::attrs::Attributes;
use ferroform_core::schema::Delta;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::conns::{AwsConnections, Connections, ProviderMeta, validate_credentials};
use crate::context::OperationContext;
use crate::error::ProviderError;
use crate::handler::ResourceHandler;
use crate::lifecycle::{InstanceStatus, Operation};
use crate::registry::Registry;
use crate::state::InstanceState;
use crate::tagging::{keep_configured_tags, merge_default_tags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    NoOp,
    Create,
    Update,
    /// Destroy and recreate: at least one changed attribute forces it.
    Replace,
}

/// What applying a configuration to one instance would do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedChange {
    pub resource_type: String,
    pub action: PlanAction,
    pub delta: Delta,
}

impl PlannedChange {
    pub fn has_changes(&self) -> bool {
        self.action != PlanAction::NoOp
    }
}

/// Entry point for the orchestrator.
///
/// Looks handlers up by resource type, validates and defaults configuration
/// before any remote call, and enforces the per-instance lifecycle.
pub struct Provider {
    meta: ProviderMeta,
    registry: Registry,
}

impl Provider {
    pub fn new(config: ProviderConfig, conns: Arc<dyn Connections>) -> Self {
        Self {
            meta: ProviderMeta::new(config, conns),
            registry: Registry::new(),
        }
    }

    /// Build AWS clients from `config` and check the credentials resolve.
    pub async fn connect(config: ProviderConfig) -> Result<Self, ProviderError> {
        config.validate()?;
        let conns = AwsConnections::from_config(&config).await;
        let identity = validate_credentials(conns.sdk_config()).await?;
        tracing::info!(
            account_id = %identity.account_id,
            region = %config.region,
            "provider configured"
        );
        Ok(Self::new(config, Arc::new(conns)))
    }

    pub fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.meta.config
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registry.resource_types()
    }

    pub fn schema(&self, resource_type: &str) -> Result<&'static Schema, ProviderError> {
        Ok(self.registry.get(resource_type)?.schema())
    }

    /// Validate `config` and return it with defaults applied and `tags_all`
    /// merged from the provider default tags.
    pub fn validate(
        &self,
        resource_type: &str,
        config: &Value,
    ) -> Result<Attributes, ProviderError> {
        let handler = self.registry.get(resource_type)?;
        self.prepare(handler, config)
    }

    fn prepare(
        &self,
        handler: &dyn ResourceHandler,
        config: &Value,
    ) -> Result<Attributes, ProviderError> {
        let schema = handler.schema();
        let mut desired = schema.validate(config)?;
        schema.apply_defaults(&mut desired);
        if schema.attribute(ferroform_core::schema::attr::TAGS_ALL).is_some() {
            merge_default_tags(&self.meta.config, &mut desired)?;
        }
        Ok(desired)
    }

    /// Plan the change that would bring `prior` (or nothing) to `config`.
    pub fn plan(
        &self,
        resource_type: &str,
        prior: Option<&InstanceState>,
        config: &Value,
    ) -> Result<PlannedChange, ProviderError> {
        let handler = self.registry.get(resource_type)?;
        let desired = self.prepare(handler, config)?;

        let (action, delta) = match prior {
            None => (PlanAction::Create, Delta::default()),
            Some(prior) => {
                let delta = handler.schema().diff(&prior.attributes, &desired);
                let action = if prior.tainted {
                    PlanAction::Replace
                } else if delta.is_empty() {
                    PlanAction::NoOp
                } else if delta.requires_replacement() {
                    PlanAction::Replace
                } else {
                    PlanAction::Update
                };
                (action, delta)
            }
        };

        Ok(PlannedChange {
            resource_type: resource_type.to_string(),
            action,
            delta,
        })
    }

    pub async fn create(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
        config: &Value,
    ) -> Result<InstanceState, ProviderError> {
        let handler = self.registry.get(resource_type)?;
        let desired = self.prepare(handler, config)?;
        let status = InstanceStatus::Absent.begin(Operation::Create)?;

        tracing::debug!(resource_type, %status, "creating");
        match handler.create(ctx, &self.meta, &desired).await {
            Ok(mut state) => {
                self.settle(handler, &desired, &mut state)?;
                Ok(state)
            }
            Err(ProviderError::IncompleteCreate { source, state }) => {
                tracing::warn!(
                    resource_type,
                    id = %state.id,
                    error = %source,
                    "created but not usable, recording as tainted"
                );
                Err(ProviderError::IncompleteCreate { source, state })
            }
            Err(e) => {
                tracing::warn!(resource_type, error = %e, "create failed");
                Err(e)
            }
        }
    }

    /// Refresh `prior`. `None` means the remote entity is gone and the
    /// orchestrator should plan a recreate.
    pub async fn read(
        &self,
        ctx: &OperationContext,
        prior: &InstanceState,
    ) -> Result<Option<InstanceState>, ProviderError> {
        let handler = self.registry.get(&prior.resource_type)?;
        prior.status.begin(Operation::Read)?;

        match handler.read(ctx, &self.meta, &prior.id).await? {
            Some(mut state) => {
                self.settle(handler, &prior.attributes, &mut state)?;
                state.tainted = prior.tainted;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Apply `config` to an existing instance. An empty delta makes no
    /// remote calls; a replacement-only change is rejected, since it must
    /// be planned as delete + create.
    pub async fn update(
        &self,
        ctx: &OperationContext,
        prior: &InstanceState,
        config: &Value,
    ) -> Result<InstanceState, ProviderError> {
        let handler = self.registry.get(&prior.resource_type)?;
        let desired = self.prepare(handler, config)?;
        if prior.tainted {
            return Err(ProviderError::Lifecycle(format!(
                "{}.{} is tainted and must be replaced",
                prior.resource_type, prior.id
            )));
        }
        let delta = handler.schema().diff(&prior.attributes, &desired);

        if delta.is_empty() {
            tracing::debug!(resource_type = %prior.resource_type, id = %prior.id, "no changes");
            return Ok(prior.clone());
        }
        if delta.requires_replacement() {
            let fields: Vec<_> = delta
                .drifts
                .iter()
                .filter(|d| d.forces_replacement)
                .map(|d| d.field.as_str())
                .collect();
            return Err(ProviderError::Lifecycle(format!(
                "{}.{} cannot be updated in place; changes to [{}] force replacement",
                prior.resource_type,
                prior.id,
                fields.join(", ")
            )));
        }

        let status = prior.status.begin(Operation::Update)?;
        tracing::debug!(
            resource_type = %prior.resource_type,
            id = %prior.id,
            %status,
            fields = ?delta.fields().collect::<Vec<_>>(),
            "updating"
        );

        let mut state = handler
            .update(ctx, &self.meta, prior, &desired, &delta)
            .await
            .map_err(|e| e.with_resource(&prior.resource_type, &prior.id))?;
        self.settle(handler, &desired, &mut state)?;
        Ok(state)
    }

    /// Fill in what a refresh cannot see from the configuration the state
    /// was produced from.
    fn settle(
        &self,
        handler: &dyn ResourceHandler,
        configured: &Attributes,
        state: &mut InstanceState,
    ) -> Result<(), ProviderError> {
        handler.schema().carry_forward(configured, &mut state.attributes);
        keep_configured_tags(&self.meta.config, configured, &mut state.attributes)?;
        state.status = InstanceStatus::Present;
        Ok(())
    }

    /// Delete the remote entity. Already gone is success.
    pub async fn delete(
        &self,
        ctx: &OperationContext,
        state: &InstanceState,
    ) -> Result<(), ProviderError> {
        let handler = self.registry.get(&state.resource_type)?;
        state.status.begin(Operation::Delete)?;

        match handler.delete(ctx, &self.meta, state).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    resource_type = %state.resource_type,
                    id = %state.id,
                    "already deleted"
                );
                Ok(())
            }
            Err(e) => Err(e.with_resource(&state.resource_type, &state.id)),
        }
    }

    /// Reconstruct state from a bare identifier. Attributes a read cannot
    /// recover get their defaults.
    pub async fn import(
        &self,
        ctx: &OperationContext,
        resource_type: &str,
        id: &str,
    ) -> Result<InstanceState, ProviderError> {
        let handler = self.registry.get(resource_type)?;
        let mut state = handler
            .read(ctx, &self.meta, id)
            .await?
            .ok_or_else(|| ProviderError::not_found(resource_type, id))?;
        handler.schema().apply_import_defaults(&mut state.attributes);
        tracing::info!(resource_type, id, "imported");
        Ok(state)
    }
}
