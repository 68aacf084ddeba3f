use crate::error::ProviderError;

use super::api::{AmpApi, Workspace};

/// Describe a workspace by id. Workspaces in `DELETING` are still returned;
/// callers waiting for deletion poll until this reports not found.
pub async fn find_workspace_by_id(
    api: &dyn AmpApi,
    workspace_id: &str,
) -> Result<Workspace, ProviderError> {
    api.describe_workspace(workspace_id).await
}
