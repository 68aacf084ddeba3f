use aws_sdk_licensemanager::Client;
use aws_sdk_licensemanager::types::{LicenseCountingType, Tag};
use ferroform_core::TagMap;

use crate::error::{ProviderError, from_sdk};
use crate::handler::BoxFuture;
use crate::tagging::Tagger;

use super::RESOURCE_TYPE;

/// A license configuration as returned by `GetLicenseConfiguration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseConfiguration {
    pub arn: String,
    pub name: String,
    pub description: String,
    pub license_count: Option<i64>,
    pub license_count_hard_limit: bool,
    pub license_counting_type: String,
    pub license_rules: Vec<String>,
    pub owner_account_id: String,
    pub status: String,
    pub tags: TagMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateLicenseConfigurationInput {
    pub name: String,
    pub description: Option<String>,
    pub license_count: Option<i64>,
    pub license_count_hard_limit: bool,
    pub license_counting_type: String,
    pub license_rules: Vec<String>,
    pub tags: TagMap,
}

/// Everything `UpdateLicenseConfiguration` can change, sent together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateLicenseConfigurationInput {
    pub arn: String,
    pub name: String,
    pub description: String,
    pub license_count: i64,
    pub license_count_hard_limit: bool,
}

pub trait LicenseManagerApi: Tagger {
    /// Returns the new configuration's ARN.
    fn create_license_configuration<'a>(
        &'a self,
        input: &'a CreateLicenseConfigurationInput,
    ) -> BoxFuture<'a, Result<String, ProviderError>>;

    fn get_license_configuration<'a>(
        &'a self,
        arn: &'a str,
    ) -> BoxFuture<'a, Result<LicenseConfiguration, ProviderError>>;

    fn update_license_configuration<'a>(
        &'a self,
        input: &'a UpdateLicenseConfigurationInput,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    fn delete_license_configuration<'a>(
        &'a self,
        arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;
}

pub struct AwsLicenseManager {
    client: Client,
}

impl AwsLicenseManager {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn to_sdk_tags(tags: &TagMap) -> Vec<Tag> {
    tags.iter()
        .map(|(k, v)| Tag::builder().key(k).value(v).build())
        .collect()
}

impl Tagger for AwsLicenseManager {
    fn tag_resource<'a>(
        &'a self,
        identifier: &'a str,
        tags: &'a TagMap,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .tag_resource()
                .resource_arn(identifier)
                .set_tags(Some(to_sdk_tags(tags)))
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, identifier))?;
            Ok(())
        })
    }

    fn untag_resource<'a>(
        &'a self,
        identifier: &'a str,
        keys: &'a [String],
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .untag_resource()
                .resource_arn(identifier)
                .set_tag_keys(Some(keys.to_vec()))
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, identifier))?;
            Ok(())
        })
    }
}

impl LicenseManagerApi for AwsLicenseManager {
    fn create_license_configuration<'a>(
        &'a self,
        input: &'a CreateLicenseConfigurationInput,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            let resp = self
                .client
                .create_license_configuration()
                .name(&input.name)
                .set_description(input.description.clone())
                .set_license_count(input.license_count)
                .license_count_hard_limit(input.license_count_hard_limit)
                .license_counting_type(LicenseCountingType::from(
                    input.license_counting_type.as_str(),
                ))
                .set_license_rules(
                    (!input.license_rules.is_empty()).then(|| input.license_rules.clone()),
                )
                .set_tags((!input.tags.is_empty()).then(|| to_sdk_tags(&input.tags)))
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, &input.name))?;

            resp.license_configuration_arn()
                .map(String::from)
                .ok_or_else(|| {
                    ProviderError::Fatal(
                        "CreateLicenseConfiguration returned no license configuration ARN".into(),
                    )
                })
        })
    }

    fn get_license_configuration<'a>(
        &'a self,
        arn: &'a str,
    ) -> BoxFuture<'a, Result<LicenseConfiguration, ProviderError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get_license_configuration()
                .license_configuration_arn(arn)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, arn))?;

            let mut tags = TagMap::new();
            for tag in resp.tags() {
                if let Some(key) = tag.key() {
                    tags.insert(key, tag.value().unwrap_or_default());
                }
            }

            Ok(LicenseConfiguration {
                arn: resp.license_configuration_arn().unwrap_or(arn).to_string(),
                name: resp.name().unwrap_or_default().to_string(),
                description: resp.description().unwrap_or_default().to_string(),
                license_count: resp.license_count(),
                license_count_hard_limit: resp.license_count_hard_limit().unwrap_or(false),
                license_counting_type: resp
                    .license_counting_type()
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default(),
                license_rules: resp.license_rules().to_vec(),
                owner_account_id: resp.owner_account_id().unwrap_or_default().to_string(),
                status: resp.status().unwrap_or_default().to_string(),
                tags,
            })
        })
    }

    fn update_license_configuration<'a>(
        &'a self,
        input: &'a UpdateLicenseConfigurationInput,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .update_license_configuration()
                .license_configuration_arn(&input.arn)
                .name(&input.name)
                .description(&input.description)
                .license_count(input.license_count)
                .license_count_hard_limit(input.license_count_hard_limit)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, &input.arn))?;
            Ok(())
        })
    }

    fn delete_license_configuration<'a>(
        &'a self,
        arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.client
                .delete_license_configuration()
                .license_configuration_arn(arn)
                .send()
                .await
                .map_err(|e| from_sdk(e, RESOURCE_TYPE, arn))?;
            Ok(())
        })
    }
}
