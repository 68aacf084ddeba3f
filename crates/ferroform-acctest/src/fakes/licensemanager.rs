//! License Manager in one region.

use std::collections::BTreeMap;
use std::sync::Mutex;

use ferroform_core::TagMap;
use ferroform_provider::ProviderError;
use ferroform_provider::handler::BoxFuture;
use ferroform_provider::services::licensemanager::RESOURCE_TYPE;
use ferroform_provider::services::licensemanager::api::{
    CreateLicenseConfigurationInput, LicenseConfiguration, LicenseManagerApi,
    UpdateLicenseConfigurationInput,
};
use ferroform_provider::tagging::Tagger;
use uuid::Uuid;

use super::{CallLog, Faults, lock, service_error};

const SERVICE: &str = "license-manager";
const STATUS_AVAILABLE: &str = "AVAILABLE";

pub struct FakeLicenseManager {
    region: String,
    account_id: String,
    log: CallLog,
    faults: Faults,
    configurations: Mutex<BTreeMap<String, LicenseConfiguration>>,
}

impl FakeLicenseManager {
    pub fn new(region: &str, account_id: &str, log: CallLog) -> Self {
        Self {
            region: region.to_string(),
            account_id: account_id.to_string(),
            log,
            faults: Faults::default(),
            configurations: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn fail_next(&self, operation: &str, err: ProviderError) {
        self.faults.push(operation, err);
    }

    pub fn get(&self, arn: &str) -> Option<LicenseConfiguration> {
        lock(&self.configurations).get(arn).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.configurations).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn call(&self, operation: &str) -> Result<(), ProviderError> {
        self.log.record(SERVICE, operation);
        match self.faults.take(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // License Manager has no not-found code for configurations.
    fn invalid_arn(arn: &str) -> ProviderError {
        service_error(
            "InvalidParameterValueException",
            format!("Invalid license configuration ARN: {arn}"),
            RESOURCE_TYPE,
            arn,
        )
    }

    fn with_configuration<T>(
        &self,
        arn: &str,
        f: impl FnOnce(&mut LicenseConfiguration) -> T,
    ) -> Result<T, ProviderError> {
        lock(&self.configurations)
            .get_mut(arn)
            .map(f)
            .ok_or_else(|| Self::invalid_arn(arn))
    }
}

impl Tagger for FakeLicenseManager {
    fn tag_resource<'a>(
        &'a self,
        identifier: &'a str,
        tags: &'a TagMap,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.call("TagResource")?;
            self.with_configuration(identifier, |lc| {
                for (k, v) in tags.iter() {
                    lc.tags.insert(k, v);
                }
            })
        })
    }

    fn untag_resource<'a>(
        &'a self,
        identifier: &'a str,
        keys: &'a [String],
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.call("UntagResource")?;
            self.with_configuration(identifier, |lc| {
                for k in keys {
                    lc.tags.remove(k);
                }
            })
        })
    }
}

impl LicenseManagerApi for FakeLicenseManager {
    fn create_license_configuration<'a>(
        &'a self,
        input: &'a CreateLicenseConfigurationInput,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            self.call("CreateLicenseConfiguration")?;
            if input.name.is_empty() {
                return Err(service_error(
                    "ValidationException",
                    "name must not be empty",
                    RESOURCE_TYPE,
                    "",
                ));
            }

            let arn = format!(
                "arn:aws:license-manager:{}:{}:license-configuration:lic-{}",
                self.region,
                self.account_id,
                Uuid::new_v4().simple()
            );
            let lc = LicenseConfiguration {
                arn: arn.clone(),
                name: input.name.clone(),
                description: input.description.clone().unwrap_or_default(),
                license_count: input.license_count,
                license_count_hard_limit: input.license_count_hard_limit,
                license_counting_type: input.license_counting_type.clone(),
                license_rules: input.license_rules.clone(),
                owner_account_id: self.account_id.clone(),
                status: STATUS_AVAILABLE.to_string(),
                tags: input.tags.clone(),
            };
            lock(&self.configurations).insert(arn.clone(), lc);
            Ok(arn)
        })
    }

    fn get_license_configuration<'a>(
        &'a self,
        arn: &'a str,
    ) -> BoxFuture<'a, Result<LicenseConfiguration, ProviderError>> {
        Box::pin(async move {
            self.call("GetLicenseConfiguration")?;
            self.with_configuration(arn, |lc| lc.clone())
        })
    }

    fn update_license_configuration<'a>(
        &'a self,
        input: &'a UpdateLicenseConfigurationInput,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.call("UpdateLicenseConfiguration")?;
            self.with_configuration(&input.arn, |lc| {
                lc.name = input.name.clone();
                lc.description = input.description.clone();
                lc.license_count = Some(input.license_count);
                lc.license_count_hard_limit = input.license_count_hard_limit;
            })
        })
    }

    fn delete_license_configuration<'a>(
        &'a self,
        arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.call("DeleteLicenseConfiguration")?;
            lock(&self.configurations)
                .remove(arn)
                .map(|_| ())
                .ok_or_else(|| Self::invalid_arn(arn))
        })
    }
}
