//! ferroform-acctest
//!
//! Acceptance testing for the provider: a declarative step runner
//! ([`Harness`], [`TestCase`], [`Step`]), attribute [`Check`]s, and
//! in-memory control planes ([`fakes`]) that stand in for AWS. The same
//! test cases run against real AWS through `AwsConnections`.

pub mod check;
pub mod env;
pub mod error;
pub mod fakes;
pub mod harness;

pub use crate::check::Check;
pub use crate::env::{fake_config, init_logging, pre_check_regions, random_name};
pub use crate::error::HarnessError;
pub use crate::fakes::FakeConnections;
pub use crate::harness::{Config, Harness, RunOutcome, State, Step, TestCase};
