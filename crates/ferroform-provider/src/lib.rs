//! ferroform-provider
//!
//! CRUD handlers for AWS resources, in the shape of a Terraform-style
//! provider. The orchestrator owns planning, ordering and state; this crate
//! validates configuration, talks to the control plane, and hands back
//! refreshed instance state.
//!
//! Public API:
//! - [`Provider`]: validate / plan / create / read / update / delete / import
//! - [`Registry`]: resource type string → [`ResourceHandler`]
//! - [`ProviderConfig`]: region, credentials, default and ignored tags,
//!   retry and timeout settings
//! - [`Connections`]: the control-plane seam, one client per service

pub mod addr;
pub mod config;
pub mod conns;
pub mod context;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod services;
pub mod state;
pub mod tagging;

pub use crate::addr::ResourceAddr;
pub use crate::config::{ProviderConfig, load_config, save_config};
pub use crate::conns::{AwsConnections, Connections, ProviderMeta};
pub use crate::context::OperationContext;
pub use crate::error::ProviderError;
pub use crate::handler::ResourceHandler;
pub use crate::lifecycle::InstanceStatus;
pub use crate::provider::{PlanAction, PlannedChange, Provider};
pub use crate::registry::{Registry, ResourceKind};
pub use crate::state::InstanceState;
