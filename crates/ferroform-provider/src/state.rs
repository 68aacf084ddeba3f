use ferroform_core::attrs::{self, Attributes};
use ferroform_core::schema::attr;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lifecycle::InstanceStatus;

/// State of a single managed instance as returned to the orchestrator.
///
/// The handler owns no persistent state; whatever it returns here is what
/// the orchestrator records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub resource_type: String,
    /// Provider-assigned identifier. Immutable once created.
    pub id: String,
    pub status: InstanceStatus,
    /// Created remotely but never reached a usable state. The next plan
    /// replaces it.
    #[serde(default)]
    pub tainted: bool,
    pub attributes: Attributes,
}

impl InstanceState {
    pub fn new(resource_type: &str, id: impl Into<String>, mut attributes: Attributes) -> Self {
        let id = id.into();
        attributes.insert(attr::ID.into(), Value::String(id.clone()));
        Self {
            resource_type: resource_type.to_string(),
            id,
            status: InstanceStatus::Present,
            tainted: false,
            attributes,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        attrs::get_str(&self.attributes, name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        attrs::get_bool(&self.attributes, name)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        attrs::get_i64(&self.attributes, name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.attributes.clone())
    }
}
