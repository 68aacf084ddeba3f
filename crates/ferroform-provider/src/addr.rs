use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Composite key for addressing a resource in configuration and state.
///
/// Two resources of the same type but different names (e.g. two
/// `aws_kms_replica_key` blocks) have distinct addresses.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ResourceAddr {
    pub resource_type: String,
    pub resource_name: String,
}

impl ResourceAddr {
    pub fn new(resource_type: &str, resource_name: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            resource_name: resource_name.to_string(),
        }
    }
}

impl fmt::Display for ResourceAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.resource_name)
    }
}

impl FromStr for ResourceAddr {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((ty, name)) if !ty.is_empty() && !name.is_empty() => Ok(Self::new(ty, name)),
            _ => Err(ProviderError::Validation(format!(
                "resource address {s:?} must look like <type>.<name>"
            ))),
        }
    }
}
