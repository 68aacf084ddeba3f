//! One module per AWS service: the API seam, its finder, and the resource
//! handlers built on them.

pub mod amp;
pub mod kms;
pub mod licensemanager;
