use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// An Amazon Resource Name.
///
/// `arn:partition:service:region:account-id:resource`. The resource part
/// may itself contain `:` and `/` separators and is kept verbatim.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    /// True when `s` parses as an ARN.
    pub fn is_valid(s: &str) -> bool {
        s.parse::<Arn>().is_ok()
    }

    /// The resource part with any `type/` or `type:` prefix removed,
    /// e.g. `key/mrk-123` → `mrk-123`.
    pub fn resource_id(&self) -> &str {
        self.resource
            .split_once(['/', ':'])
            .map_or(self.resource.as_str(), |(_, id)| id)
    }
}

impl FromStr for Arn {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CoreError::InvalidArn {
            arn: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.splitn(6, ':');
        if parts.next() != Some("arn") {
            return Err(invalid("must start with \"arn:\""));
        }
        let partition = parts.next().unwrap_or_default();
        let service = parts.next().unwrap_or_default();
        let region = parts.next();
        let account_id = parts.next();
        let resource = parts.next();

        let (Some(region), Some(account_id), Some(resource)) = (region, account_id, resource)
        else {
            return Err(invalid("expected 6 colon-separated sections"));
        };
        if partition.is_empty() {
            return Err(invalid("partition is empty"));
        }
        if service.is_empty() {
            return Err(invalid("service is empty"));
        }
        if resource.is_empty() {
            return Err(invalid("resource is empty"));
        }

        Ok(Arn {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            resource: resource.to_string(),
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}
