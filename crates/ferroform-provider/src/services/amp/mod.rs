pub mod api;
pub mod finder;
pub mod workspace;

pub const RESOURCE_TYPE: &str = "aws_prometheus_workspace";
