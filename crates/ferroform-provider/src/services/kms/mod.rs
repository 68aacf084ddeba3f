pub mod api;
pub mod finder;
pub mod replica_key;

pub const RESOURCE_TYPE: &str = "aws_kms_replica_key";
