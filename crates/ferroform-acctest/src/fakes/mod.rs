//! In-memory control planes standing in for AWS.
//!
//! The fakes implement the provider's API traits directly and answer with
//! already-classified errors, built from the same service error codes the
//! real endpoints return. Every call is recorded in a shared [`CallLog`] so
//! tests can assert how many remote calls an operation made.

pub mod amp;
pub mod kms;
pub mod licensemanager;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ferroform_provider::Connections;
use ferroform_provider::ProviderError;
use ferroform_provider::error::{ErrorClass, classify};
use ferroform_provider::services::amp::api::AmpApi;
use ferroform_provider::services::kms::api::KmsApi;
use ferroform_provider::services::licensemanager::api::LicenseManagerApi;

pub use amp::FakeAmp;
pub use kms::{FakeKms, KmsBackend};
pub use licensemanager::FakeLicenseManager;

pub const ACCOUNT_ID: &str = "123456789012";

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build the error a real endpoint would produce for `code`.
pub(crate) fn service_error(
    code: &str,
    message: impl Into<String>,
    resource_type: &str,
    resource_id: &str,
) -> ProviderError {
    let detail = format!("{code}: {}", message.into());
    match classify(Some(code), &detail) {
        ErrorClass::NotFound => ProviderError::not_found(resource_type, resource_id),
        ErrorClass::Transient => ProviderError::Transient(detail),
        ErrorClass::Conflict => ProviderError::Conflict(detail),
        ErrorClass::Validation => ProviderError::Validation(detail),
        ErrorClass::Fatal => ProviderError::Fatal(detail),
    }
}

/// Ordered record of remote calls, as `service:Operation`.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, service: &str, operation: &str) {
        tracing::trace!(service, operation, "fake call");
        lock(&self.0).push(format!("{service}:{operation}"));
    }

    pub fn len(&self) -> usize {
        lock(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    /// Calls since index `from`, for asserting on one operation.
    pub fn since(&self, from: usize) -> Vec<String> {
        lock(&self.0).iter().skip(from).cloned().collect()
    }

    pub fn count(&self, call: &str) -> usize {
        lock(&self.0).iter().filter(|c| *c == call).count()
    }
}

/// One-shot failures queued per operation name.
#[derive(Default)]
pub(crate) struct Faults(Mutex<HashMap<String, VecDeque<ProviderError>>>);

impl Faults {
    pub(crate) fn push(&self, operation: &str, err: ProviderError) {
        lock(&self.0)
            .entry(operation.to_string())
            .or_default()
            .push_back(err);
    }

    pub(crate) fn take(&self, operation: &str) -> Option<ProviderError> {
        lock(&self.0)
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
    }
}

/// [`Connections`] backed by the in-memory fakes.
///
/// KMS spans all regions through one [`KmsBackend`]; License Manager and
/// AMP live in the region the connections were created for.
pub struct FakeConnections {
    log: CallLog,
    pub kms: Arc<KmsBackend>,
    pub license_manager: Arc<FakeLicenseManager>,
    pub amp: Arc<FakeAmp>,
}

impl FakeConnections {
    pub fn new(region: &str) -> Self {
        let log = CallLog::new();
        Self {
            kms: Arc::new(KmsBackend::new(ACCOUNT_ID, log.clone())),
            license_manager: Arc::new(FakeLicenseManager::new(region, ACCOUNT_ID, log.clone())),
            amp: Arc::new(FakeAmp::new(region, ACCOUNT_ID, log.clone())),
            log,
        }
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }
}

impl Connections for FakeConnections {
    fn kms(&self, region: &str) -> Arc<dyn KmsApi> {
        Arc::new(FakeKms::new(region, self.kms.clone()))
    }

    fn license_manager(&self) -> Arc<dyn LicenseManagerApi> {
        self.license_manager.clone()
    }

    fn amp(&self) -> Arc<dyn AmpApi> {
        self.amp.clone()
    }
}
