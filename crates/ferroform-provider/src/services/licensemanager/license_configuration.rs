//! `aws_licensemanager_license_configuration`.
//!
//! Identified by ARN. Name, description, count and hard limit are all
//! changed by one `UpdateLicenseConfiguration` call; counting type and
//! rules can only be set at creation.

use ferroform_core::attrs::{self, Attributes};
use ferroform_core::schema::{AttrType, Attribute, DefaultValue, Delta, attr};
use ferroform_core::Schema;
use serde_json::{Value, json};

use crate::conns::ProviderMeta;
use crate::context::OperationContext;
use crate::error::ProviderError;
use crate::handler::{BoxFuture, ResourceHandler, UpdateProgress};
use crate::retry::with_retry;
use crate::state::InstanceState;
use crate::tagging::{desired_tags_all, prior_tags_all, set_read_tags, update_tags};

use super::RESOURCE_TYPE;
use super::api::{CreateLicenseConfigurationInput, UpdateLicenseConfigurationInput};
use super::finder::find_license_configuration_by_arn;

pub const LICENSE_COUNT: &str = "license_count";
pub const LICENSE_COUNT_HARD_LIMIT: &str = "license_count_hard_limit";
pub const LICENSE_COUNTING_TYPE: &str = "license_counting_type";
pub const LICENSE_RULES: &str = "license_rules";
pub const OWNER_ACCOUNT_ID: &str = "owner_account_id";

pub const LICENSE_COUNTING_TYPES: &[&str] = &["vCPU", "Instance", "Core", "Socket"];

/// Attributes carried by `UpdateLicenseConfiguration`.
const UPDATABLE: &[&str] = &[
    attr::NAME,
    attr::DESCRIPTION,
    LICENSE_COUNT,
    LICENSE_COUNT_HARD_LIMIT,
];

pub static SCHEMA: Schema = Schema {
    type_name: RESOURCE_TYPE,
    attributes: &[
        Attribute::required(attr::NAME, AttrType::String).label("Name"),
        Attribute::required(LICENSE_COUNTING_TYPE, AttrType::String)
            .label("License counting type")
            .force_new()
            .validate_with(validate_counting_type),
        Attribute::optional(attr::DESCRIPTION, AttrType::String)
            .label("Description")
            .default_value(DefaultValue::Str("")),
        Attribute::optional(LICENSE_COUNT, AttrType::Int)
            .label("License count")
            .default_value(DefaultValue::Int(0))
            .validate_with(validate_license_count),
        Attribute::optional(LICENSE_COUNT_HARD_LIMIT, AttrType::Bool)
            .label("Hard limit")
            .default_value(DefaultValue::Bool(false)),
        Attribute::optional(LICENSE_RULES, AttrType::StringList)
            .label("License rules")
            .force_new()
            .validate_with(validate_license_rules),
        Attribute::tags(),
        Attribute::tags_all(),
        Attribute::computed(attr::ARN, AttrType::String).label("ARN"),
        Attribute::computed(OWNER_ACCOUNT_ID, AttrType::String).label("Owner account ID"),
    ],
};

fn validate_counting_type(value: &Value) -> Result<(), String> {
    let s = value.as_str().unwrap_or_default();
    if LICENSE_COUNTING_TYPES.contains(&s) {
        Ok(())
    } else {
        Err(format!(
            "expected one of {}, got {s:?}",
            LICENSE_COUNTING_TYPES.join(", ")
        ))
    }
}

fn validate_license_count(value: &Value) -> Result<(), String> {
    match value.as_i64() {
        Some(n) if n >= 0 => Ok(()),
        _ => Err(format!("must be non-negative, got {value}")),
    }
}

fn validate_license_rules(value: &Value) -> Result<(), String> {
    let rules = value.as_array().map(Vec::as_slice).unwrap_or_default();
    for rule in rules {
        let rule = rule.as_str().unwrap_or_default();
        if !rule.starts_with('#') {
            return Err(format!("rule {rule:?} must start with '#'"));
        }
    }
    Ok(())
}

pub struct LicenseConfigurationHandler;

impl LicenseConfigurationHandler {
    async fn refresh(
        &self,
        ctx: &OperationContext,
        meta: &ProviderMeta,
        arn: &str,
    ) -> Result<InstanceState, ProviderError> {
        self.read(ctx, meta, arn)
            .await?
            .ok_or_else(|| ProviderError::not_found(RESOURCE_TYPE, arn))
    }
}

impl ResourceHandler for LicenseConfigurationHandler {
    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn create<'a>(
        &'a self,
        ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        desired: &'a Attributes,
    ) -> BoxFuture<'a, Result<InstanceState, ProviderError>> {
        Box::pin(async move {
            let api = meta.conns.license_manager();
            let api = api.as_ref();

            let input = CreateLicenseConfigurationInput {
                name: attrs::get_str(desired, attr::NAME)
                    .unwrap_or_default()
                    .to_string(),
                description: attrs::get_non_empty_str(desired, attr::DESCRIPTION).map(String::from),
                license_count: attrs::get_i64(desired, LICENSE_COUNT).filter(|n| *n > 0),
                license_count_hard_limit: attrs::get_bool(desired, LICENSE_COUNT_HARD_LIMIT)
                    .unwrap_or(false),
                license_counting_type: attrs::get_str(desired, LICENSE_COUNTING_TYPE)
                    .unwrap_or_default()
                    .to_string(),
                license_rules: attrs::get_string_list(desired, LICENSE_RULES),
                tags: desired_tags_all(desired)?.ignoring(&meta.config.ignore_tags),
            };
            let input = &input;

            let arn = with_retry(
                ctx,
                &meta.config.retry,
                meta.config.timeouts.create(),
                "create license configuration",
                move || api.create_license_configuration(input),
            )
            .await?;

            tracing::info!(arn = %arn, name = %input.name, "license configuration created");
            self.refresh(ctx, meta, &arn).await
        })
    }

    fn read<'a>(
        &'a self,
        _ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<InstanceState>, ProviderError>> {
        Box::pin(async move {
            let api = meta.conns.license_manager();
            let lc = match find_license_configuration_by_arn(api.as_ref(), id).await {
                Ok(lc) => lc,
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        arn = id,
                        "license configuration not found, removing from state"
                    );
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };

            let mut attributes = Attributes::new();
            attributes.insert(attr::ARN.into(), json!(lc.arn));
            attributes.insert(attr::NAME.into(), json!(lc.name));
            attributes.insert(attr::DESCRIPTION.into(), json!(lc.description));
            attributes.insert(LICENSE_COUNT.into(), json!(lc.license_count.unwrap_or(0)));
            attributes.insert(
                LICENSE_COUNT_HARD_LIMIT.into(),
                json!(lc.license_count_hard_limit),
            );
            attributes.insert(LICENSE_COUNTING_TYPE.into(), json!(lc.license_counting_type));
            attributes.insert(LICENSE_RULES.into(), json!(lc.license_rules));
            attributes.insert(OWNER_ACCOUNT_ID.into(), json!(lc.owner_account_id));
            set_read_tags(&meta.config, &mut attributes, &lc.tags);

            Ok(Some(InstanceState::new(RESOURCE_TYPE, lc.arn, attributes)))
        })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        prior: &'a InstanceState,
        desired: &'a Attributes,
        delta: &'a Delta,
    ) -> BoxFuture<'a, Result<InstanceState, ProviderError>> {
        Box::pin(async move {
            let api = meta.conns.license_manager();
            let api = api.as_ref();
            let arn = prior.id.as_str();
            let mut progress = UpdateProgress::new(prior, desired);

            let changed: Vec<&str> = UPDATABLE
                .iter()
                .copied()
                .filter(|f| delta.has_change(f))
                .collect();

            if !changed.is_empty() {
                let input = UpdateLicenseConfigurationInput {
                    arn: arn.to_string(),
                    name: attrs::get_str(desired, attr::NAME)
                        .unwrap_or_default()
                        .to_string(),
                    description: attrs::get_str(desired, attr::DESCRIPTION)
                        .unwrap_or_default()
                        .to_string(),
                    license_count: attrs::get_i64(desired, LICENSE_COUNT).unwrap_or(0),
                    license_count_hard_limit: attrs::get_bool(desired, LICENSE_COUNT_HARD_LIMIT)
                        .unwrap_or(false),
                };
                let input = &input;

                let result = with_retry(
                    ctx,
                    &meta.config.retry,
                    meta.config.timeouts.update(),
                    "update license configuration",
                    move || api.update_license_configuration(input),
                )
                .await;
                if let Err(e) = result {
                    return Err(progress.fail(changed[0], e));
                }
                for field in changed {
                    progress.applied(field);
                }
            }

            if delta.has_change(attr::TAGS_ALL) {
                let remote = prior_tags_all(prior)?;
                let wanted = desired_tags_all(desired)?;
                if let Err(e) =
                    update_tags(api, arn, &remote, &wanted, &meta.config.ignore_tags).await
                {
                    return Err(progress.fail(attr::TAGS_ALL, e));
                }
                progress.applied(attr::TAGS_ALL);
            }

            tracing::info!(
                arn,
                changed = ?progress.applied_fields(),
                "license configuration updated"
            );
            self.refresh(ctx, meta, arn).await
        })
    }

    fn delete<'a>(
        &'a self,
        ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        state: &'a InstanceState,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let api = meta.conns.license_manager();
            let api = api.as_ref();
            let arn = state.id.as_str();

            let result = with_retry(
                ctx,
                &meta.config.retry,
                meta.config.timeouts.delete(),
                "delete license configuration",
                move || api.delete_license_configuration(arn),
            )
            .await;

            match result {
                Ok(()) => {
                    tracing::info!(arn, "license configuration deleted");
                    Ok(())
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!(arn, "license configuration already gone");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
    }
}
