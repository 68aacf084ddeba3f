use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::{CredentialSource, ProviderConfig};
use crate::error::{ProviderError, format_err_chain};
use crate::services::amp::api::{AmpApi, AwsAmp};
use crate::services::kms::api::{AwsKms, KmsApi};
use crate::services::licensemanager::api::{AwsLicenseManager, LicenseManagerApi};

/// Client handles for every service the provider talks to.
///
/// KMS is addressed per region: replica keys are created through the
/// primary key's region.
pub trait Connections: Send + Sync {
    fn kms(&self, region: &str) -> Arc<dyn KmsApi>;
    fn license_manager(&self) -> Arc<dyn LicenseManagerApi>;
    fn amp(&self) -> Arc<dyn AmpApi>;
}

/// Explicit provider configuration passed into every handler invocation.
#[derive(Clone)]
pub struct ProviderMeta {
    pub config: ProviderConfig,
    pub conns: Arc<dyn Connections>,
}

impl ProviderMeta {
    pub fn new(config: ProviderConfig, conns: Arc<dyn Connections>) -> Self {
        Self { config, conns }
    }

    /// KMS client for the provider's own region.
    pub fn kms(&self) -> Arc<dyn KmsApi> {
        self.conns.kms(&self.config.region)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub account_id: String,
    pub arn: String,
    pub user_id: String,
}

/// Build an `SdkConfig` from a region and credential source.
pub async fn build_aws_config(region: &str, creds: &CredentialSource) -> aws_config::SdkConfig {
    let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()));

    match creds {
        CredentialSource::Inline {
            access_key_id,
            secret_access_key,
            session_token,
        } => {
            builder = builder.credentials_provider(aws_sdk_sts::config::Credentials::new(
                access_key_id,
                secret_access_key,
                session_token.clone(),
                None,
                "ferroform-config",
            ));
        }
        CredentialSource::Profile { profile_name } => {
            builder = builder.profile_name(profile_name);
        }
        CredentialSource::DefaultChain => {}
    }

    builder.load().await
}

/// Call STS GetCallerIdentity to validate credentials.
pub async fn validate_credentials(
    config: &aws_config::SdkConfig,
) -> Result<CallerIdentity, ProviderError> {
    let sts = aws_sdk_sts::Client::new(config);
    let resp = sts
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| {
            ProviderError::Config(format!(
                "STS GetCallerIdentity failed: {}",
                format_err_chain(&e)
            ))
        })?;

    Ok(CallerIdentity {
        account_id: resp.account().unwrap_or_default().to_string(),
        arn: resp.arn().unwrap_or_default().to_string(),
        user_id: resp.user_id().unwrap_or_default().to_string(),
    })
}

/// Connections backed by the AWS SDK.
pub struct AwsConnections {
    sdk_config: aws_config::SdkConfig,
    kms: Mutex<HashMap<String, Arc<dyn KmsApi>>>,
    license_manager: Arc<dyn LicenseManagerApi>,
    amp: Arc<dyn AmpApi>,
}

impl AwsConnections {
    pub async fn from_config(config: &ProviderConfig) -> Self {
        let sdk_config = build_aws_config(&config.region, &config.credentials).await;
        Self::new(sdk_config)
    }

    pub fn new(sdk_config: aws_config::SdkConfig) -> Self {
        Self {
            license_manager: Arc::new(AwsLicenseManager::new(aws_sdk_licensemanager::Client::new(
                &sdk_config,
            ))),
            amp: Arc::new(AwsAmp::new(aws_sdk_amp::Client::new(&sdk_config))),
            kms: Mutex::new(HashMap::new()),
            sdk_config,
        }
    }

    pub fn sdk_config(&self) -> &aws_config::SdkConfig {
        &self.sdk_config
    }
}

impl Connections for AwsConnections {
    fn kms(&self, region: &str) -> Arc<dyn KmsApi> {
        let mut clients = self.kms.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clients
            .entry(region.to_string())
            .or_insert_with(|| {
                let conf = aws_sdk_kms::config::Builder::from(&self.sdk_config)
                    .region(aws_sdk_kms::config::Region::new(region.to_string()))
                    .build();
                let client: Arc<dyn KmsApi> =
                    Arc::new(AwsKms::new(aws_sdk_kms::Client::from_conf(conf)));
                client
            })
            .clone()
    }

    fn license_manager(&self) -> Arc<dyn LicenseManagerApi> {
        self.license_manager.clone()
    }

    fn amp(&self) -> Arc<dyn AmpApi> {
        self.amp.clone()
    }
}
