use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Where a single instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl InstanceStatus {
    /// Enter the in-flight state for `op`, or reject the transition.
    pub fn begin(self, op: Operation) -> Result<InstanceStatus, ProviderError> {
        use InstanceStatus::*;
        match (self, op) {
            (Absent, Operation::Create) => Ok(Creating),
            (Present, Operation::Read) => Ok(Present),
            (Present, Operation::Update) => Ok(Updating),
            (Present | Absent, Operation::Delete) => Ok(Deleting),
            (from, op) => Err(ProviderError::Lifecycle(format!(
                "cannot {op} an instance that is {from}"
            ))),
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            InstanceStatus::Absent => "absent",
            InstanceStatus::Creating => "creating",
            InstanceStatus::Present => "present",
            InstanceStatus::Updating => "updating",
            InstanceStatus::Deleting => "deleting",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}
