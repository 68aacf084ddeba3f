//! ferroform-core
//!
//! Pure resource-modelling types: attribute schemas, tag algebra, ARNs and
//! attribute-object helpers. No AWS SDK dependency; this is the shared
//! vocabulary of the provider and the acceptance harness.

pub mod arn;
pub mod attrs;
pub mod error;
pub mod schema;
pub mod tags;

pub use crate::arn::Arn;
pub use crate::error::CoreError;
pub use crate::schema::{AttrType, Attribute, Delta, FieldDrift, Schema};
pub use crate::tags::{IgnoreConfig, TagDiff, TagMap};
