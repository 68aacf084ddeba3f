use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;
use crate::handler::ResourceHandler;
use crate::services::amp::workspace::WorkspaceHandler;
use crate::services::kms::replica_key::ReplicaKeyHandler;
use crate::services::licensemanager::license_configuration::LicenseConfigurationHandler;
use crate::services::{amp, kms, licensemanager};

/// Every resource type this provider implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    KmsReplicaKey,
    LicenseManagerLicenseConfiguration,
    PrometheusWorkspace,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::KmsReplicaKey,
        ResourceKind::LicenseManagerLicenseConfiguration,
        ResourceKind::PrometheusWorkspace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::KmsReplicaKey => kms::RESOURCE_TYPE,
            ResourceKind::LicenseManagerLicenseConfiguration => licensemanager::RESOURCE_TYPE,
            ResourceKind::PrometheusWorkspace => amp::RESOURCE_TYPE,
        }
    }

    pub fn handler(self) -> Box<dyn ResourceHandler> {
        match self {
            ResourceKind::KmsReplicaKey => Box::new(ReplicaKeyHandler),
            ResourceKind::LicenseManagerLicenseConfiguration => {
                Box::new(LicenseConfigurationHandler)
            }
            ResourceKind::PrometheusWorkspace => Box::new(WorkspaceHandler),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ProviderError::UnknownResourceType(s.to_string()))
    }
}

/// Resource type string → handler.
pub struct Registry {
    handlers: BTreeMap<ResourceKind, Box<dyn ResourceHandler>>,
}

impl Registry {
    /// Registry with every built-in resource type.
    pub fn new() -> Self {
        Self {
            handlers: ResourceKind::ALL
                .into_iter()
                .map(|k| (k, k.handler()))
                .collect(),
        }
    }

    pub fn get(&self, resource_type: &str) -> Result<&dyn ResourceHandler, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        self.handlers
            .get(&kind)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResourceType(resource_type.to_string()))
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().map(|k| k.as_str())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
