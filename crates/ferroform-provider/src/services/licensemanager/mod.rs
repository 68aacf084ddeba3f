pub mod api;
pub mod finder;
pub mod license_configuration;

pub const RESOURCE_TYPE: &str = "aws_licensemanager_license_configuration";
