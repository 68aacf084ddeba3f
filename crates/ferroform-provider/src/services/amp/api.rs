use std::collections::HashMap;

use aws_sdk_amp::Client;
use ferroform_core::TagMap;

use crate::error::{ProviderError, from_sdk};
use crate::handler::BoxFuture;
use crate::tagging::Tagger;

use super::RESOURCE_TYPE;

pub const STATUS_CREATING: &str = "CREATING";
pub const STATUS_ACTIVE: &str = "ACTIVE";
pub const STATUS_UPDATING: &str = "UPDATING";
pub const STATUS_DELETING: &str = "DELETING";
pub const STATUS_CREATION_FAILED: &str = "CREATION_FAILED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub workspace_id: String,
    pub arn: String,
    pub alias: Option<String>,
    pub status: String,
    pub prometheus_endpoint: Option<String>,
    pub kms_key_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateWorkspaceInput {
    pub alias: Option<String>,
    pub kms_key_arn: Option<String>,
    pub tags: TagMap,
}

/// Managed Prometheus control plane. Tag calls take the workspace ARN.
pub trait AmpApi: Tagger {
    /// Returns the new workspace's id.
    fn create_workspace<'a>(
        &'a self,
        input: &'a CreateWorkspaceInput,
    ) -> BoxFuture<'a, Result<String, ProviderError>>;

    fn describe_workspace<'a>(
        &'a self,
        workspace_id: &'a str,
    ) -> BoxFuture<'a, Result<Workspace, ProviderError>>;

    fn update_workspace_alias<'a>(
        &'a self,
        workspace_id: &'a str,
        alias: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    fn delete_workspace<'a>(
        &'a self,
        workspace_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    fn list_tags_for_resource<'a>(
        &'a self,
        arn: &'a str,
    ) -> BoxFuture<'a, Result<TagMap, ProviderError>>;
}

pub struct AwsAmp {
    client: Client,
}

impl AwsAmp {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn to_sdk_tags(tags: &TagMap) -> HashMap<String, String> {
    tags.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn from_sdk_tags(tags: Option<&HashMap<String, String>>) -> TagMap {
    tags.map(|t| t.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect())
        .unwrap_or_default()
}

impl Tagger for AwsAmp {
    fn tag_resource<'a>(
        &'a self,
        identifier: &'a str,
        tags: &'a TagMap,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .tag_resource()
                .resource_arn(identifier)
                .set_tags(Some(to_sdk_tags(tags)))
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
                .resource_arn(identifier)
                .set_tag_keys(Some(keys.to_vec()))
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, identifier))?;
            Ok(())
        })
    }
}

impl AmpApi for AwsAmp {
    fn create_workspace<'a>(
        &'a self,
        input: &'a CreateWorkspaceInput,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            let resp = self
                .client
                .create_workspace()
                .set_alias(input.alias.clone())
                .set_kms_key_arn(input.kms_key_arn.clone())
                .set_tags((!input.tags.is_empty()).then(|| to_sdk_tags(&input.tags)))
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, input.alias.as_deref().unwrap_or("")))?;

            let workspace_id: Option<&str> = resp.workspace_id().into();
            workspace_id.map(String::from).ok_or_else(|| {
                ProviderError::Fatal("CreateWorkspace returned no workspace id".into())
            })
        })
    }

    fn describe_workspace<'a>(
        &'a self,
        workspace_id: &'a str,
    ) -> BoxFuture<'a, Result<Workspace, ProviderError>> {
        Box::pin(async move {
            let resp = self
                .client
                .describe_workspace()
                .workspace_id(workspace_id)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, workspace_id))?;

            let ws: Option<&aws_sdk_amp::types::WorkspaceDescription> = resp.workspace().into();
            let ws = ws.ok_or_else(|| ProviderError::not_found(RESOURCE_TYPE, workspace_id))?;

            let id: Option<&str> = ws.workspace_id().into();
            let arn: Option<&str> = ws.arn().into();
            let status: Option<&aws_sdk_amp::types::WorkspaceStatus> = ws.status().into();
            let status = status
                .and_then(|s| {
                    let code: Option<&aws_sdk_amp::types::WorkspaceStatusCode> =
                        s.status_code().into();
                    code
                })
                .map(|c| c.as_str().to_string())
                .unwrap_or_default();

            Ok(Workspace {
                workspace_id: id.unwrap_or(workspace_id).to_string(),
                arn: arn.unwrap_or_default().to_string(),
                alias: ws.alias().map(String::from),
                status,
                prometheus_endpoint: ws.prometheus_endpoint().map(String::from),
                kms_key_arn: ws.kms_key_arn().map(String::from),
            })
        })
    }

    fn update_workspace_alias<'a>(
        &'a self,
        workspace_id: &'a str,
        alias: Option<&'a str>,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .update_workspace_alias()
                .workspace_id(workspace_id)
                .set_alias(alias.map(String::from))
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, workspace_id))?;
            Ok(())
        })
    }

    fn delete_workspace<'a>(
        &'a self,
        workspace_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .delete_workspace()
                .workspace_id(workspace_id)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, workspace_id))?;
            Ok(())
        })
    }

    fn list_tags_for_resource<'a>(
        &'a self,
        arn: &'a str,
    ) -> BoxFuture<'a, Result<TagMap, ProviderError>> {
        Box::pin(async move {
            let resp = self
                .client
                .list_tags_for_resource()
                .resource_arn(arn)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, arn))?;
            Ok(from_sdk_tags(resp.tags()))
        })
    }
}
