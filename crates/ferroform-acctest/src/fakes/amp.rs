//! Managed Prometheus in one region.
//!
//! Workspaces pass through `CREATING`, `UPDATING` and `DELETING` for a
//! configurable number of describes before settling.

use std::collections::BTreeMap;
use std::sync::Mutex;

use ferroform_core::TagMap;
use ferroform_provider::ProviderError;
use ferroform_provider::handler::BoxFuture;
use ferroform_provider::services::amp::RESOURCE_TYPE;
use ferroform_provider::services::amp::api::{
    AmpApi, CreateWorkspaceInput, STATUS_ACTIVE, STATUS_CREATING, STATUS_DELETING,
    STATUS_UPDATING, Workspace,
};
use ferroform_provider::tagging::Tagger;
use uuid::Uuid;

use super::{CallLog, Faults, lock, service_error};

const SERVICE: &str = "aps";

struct StoredWorkspace {
    workspace: Workspace,
    tags: TagMap,
    pending_polls: u32,
}

struct Store {
    workspaces: BTreeMap<String, StoredWorkspace>,
    settle_polls: u32,
}

pub struct FakeAmp {
    region: String,
    account_id: String,
    log: CallLog,
    faults: Faults,
    store: Mutex<Store>,
}

impl FakeAmp {
    pub fn new(region: &str, account_id: &str, log: CallLog) -> Self {
        Self {
            region: region.to_string(),
            account_id: account_id.to_string(),
            log,
            faults: Faults::default(),
            store: Mutex::new(Store {
                workspaces: BTreeMap::new(),
                settle_polls: 1,
            }),
        }
    }

    /// Describes a workspace answers with a transitional status before it
    /// settles.
    pub fn set_settle_polls(&self, polls: u32) {
        lock(&self.store).settle_polls = polls;
    }

    pub fn fail_next(&self, operation: &str, err: ProviderError) {
        self.faults.push(operation, err);
    }

    pub fn workspace(&self, workspace_id: &str) -> Option<Workspace> {
        lock(&self.store)
            .workspaces
            .get(workspace_id)
            .map(|w| w.workspace.clone())
    }

    pub fn len(&self) -> usize {
        lock(&self.store).workspaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn call(&self, operation: &str) -> Result<(), ProviderError> {
        self.log.record(SERVICE, operation);
        match self.faults.take(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn not_found(identifier: &str) -> ProviderError {
        service_error(
            "ResourceNotFoundException",
            format!("Workspace not found: {identifier}"),
            RESOURCE_TYPE,
            identifier,
        )
    }

    fn with_tags_by_arn(
        &self,
        arn: &str,
        f: impl FnOnce(&mut TagMap),
    ) -> Result<(), ProviderError> {
        let mut store = lock(&self.store);
        let stored = store
            .workspaces
            .values_mut()
            .find(|w| w.workspace.arn == arn)
            .ok_or_else(|| Self::not_found(arn))?;
        f(&mut stored.tags);
        Ok(())
    }
}

impl Tagger for FakeAmp {
    fn tag_resource<'a>(
        &'a self,
        identifier: &'a str,
        tags: &'a TagMap,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.call("TagResource")?;
            self.with_tags_by_arn(identifier, |current| {
                for (k, v) in tags.iter() {
                    current.insert(k, v);
                }
            })
        })
    }

    fn untag_resource<'a>(
        &'a self,
        identifier: &'a str,
        keys: &'a [String],
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.call("UntagResource")?;
            self.with_tags_by_arn(identifier, |current| {
                for k in keys {
                    current.remove(k);
                }
            })
        })
    }
}

impl AmpApi for FakeAmp {
    fn create_workspace<'a>(
        &'a self,
        input: &'a CreateWorkspaceInput,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            self.call("CreateWorkspace")?;

            let workspace_id = format!("ws-{}", Uuid::new_v4());
            let workspace = Workspace {
                arn: format!(
                    "arn:aws:aps:{}:{}:workspace/{workspace_id}",
                    self.region, self.account_id
                ),
                alias: input.alias.clone(),
                status: STATUS_CREATING.to_string(),
                prometheus_endpoint: Some(format!(
                    "https://aps-workspaces.{}.amazonaws.com/workspaces/{workspace_id}/",
                    self.region
                )),
                kms_key_arn: input.kms_key_arn.clone(),
                workspace_id: workspace_id.clone(),
            };

            let mut store = lock(&self.store);
            let pending_polls = store.settle_polls;
            store.workspaces.insert(
                workspace_id.clone(),
                StoredWorkspace {
                    workspace,
                    tags: input.tags.clone(),
                    pending_polls,
                },
            );
            Ok(workspace_id)
        })
    }

    fn describe_workspace<'a>(
        &'a self,
        workspace_id: &'a str,
    ) -> BoxFuture<'a, Result<Workspace, ProviderError>> {
        Box::pin(async move {
            self.call("DescribeWorkspace")?;
            let mut store = lock(&self.store);
            let stored = store
                .workspaces
                .get_mut(workspace_id)
                .ok_or_else(|| Self::not_found(workspace_id))?;

            let mut gone = false;
            if stored.workspace.status != STATUS_ACTIVE {
                if stored.pending_polls > 0 {
                    stored.pending_polls -= 1;
                } else if stored.workspace.status == STATUS_DELETING {
                    gone = true;
                } else {
                    stored.workspace.status = STATUS_ACTIVE.to_string();
                }
            }
            let workspace = stored.workspace.clone();

            if gone {
                store.workspaces.remove(workspace_id);
                return Err(Self::not_found(workspace_id));
            }
            Ok(workspace)
        })
    }

    fn update_workspace_alias<'a>(
        &'a self,
        workspace_id: &'a str,
        alias: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.call("UpdateWorkspaceAlias")?;
            let mut store = lock(&self.store);
            let settle_polls = store.settle_polls;
            let stored = store
                .workspaces
                .get_mut(workspace_id)
                .ok_or_else(|| Self::not_found(workspace_id))?;

            if stored.workspace.status != STATUS_ACTIVE {
                return Err(service_error(
                    "ConflictException",
                    format!("workspace {workspace_id} is {}", stored.workspace.status),
                    RESOURCE_TYPE,
                    workspace_id,
                ));
            }
            stored.workspace.alias = alias.map(String::from);
            stored.workspace.status = STATUS_UPDATING.to_string();
            stored.pending_polls = settle_polls;
            Ok(())
        })
    }

    fn delete_workspace<'a>(
        &'a self,
        workspace_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.call("DeleteWorkspace")?;
            let mut store = lock(&self.store);
            let settle_polls = store.settle_polls;
            let stored = store
                .workspaces
                .get_mut(workspace_id)
                .ok_or_else(|| Self::not_found(workspace_id))?;

            stored.workspace.status = STATUS_DELETING.to_string();
            stored.pending_polls = settle_polls;
            Ok(())
        })
    }

    fn list_tags_for_resource<'a>(
        &'a self,
        arn: &'a str,
    ) -> BoxFuture<'a, Result<TagMap, ProviderError>> {
        Box::pin(async move {
            self.call("ListTagsForResource")?;
            lock(&self.store)
                .workspaces
                .values()
                .find(|w| w.workspace.arn == arn)
                .map(|w| w.tags.clone())
                .ok_or_else(|| Self::not_found(arn))
        })
    }
}
