use crate::error::ProviderError;

use super::api::{LicenseConfiguration, LicenseManagerApi};

/// Look up a license configuration by ARN.
///
/// License Manager answers an unknown ARN with an invalid-parameter error;
/// the error classifier already turns that into
/// [`ProviderError::NotFound`].
pub async fn find_license_configuration_by_arn(
    api: &dyn LicenseManagerApi,
    arn: &str,
) -> Result<LicenseConfiguration, ProviderError> {
    api.get_license_configuration(arn).await
}
