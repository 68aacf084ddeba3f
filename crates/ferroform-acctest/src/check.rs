//! Attribute assertions evaluated against harness state.
//!
//! Attributes are compared in their flattened form (`tags.%`,
//! `license_rules.0`, ...), see [`ferroform_core::attrs::flatten`].

use std::collections::BTreeMap;

use ferroform_core::TagMap;
use ferroform_core::attrs::flatten;
use ferroform_provider::ProviderError;
use regex::Regex;
use serde_json::Value;

use crate::error::HarnessError;
use crate::harness::State;

type CheckFn = Box<dyn Fn(&State) -> Result<(), HarnessError> + Send + Sync>;

pub enum Check {
    Exists {
        address: String,
    },
    Attr {
        address: String,
        key: String,
        value: String,
    },
    NoAttr {
        address: String,
        key: String,
    },
    Matches {
        address: String,
        key: String,
        pattern: String,
    },
    Pair {
        address: String,
        key: String,
        other_address: String,
        other_key: String,
    },
    JsonEquivalent {
        address: String,
        key: String,
        json: String,
    },
    FullTags {
        address: String,
        tags: TagMap,
    },
    Func(CheckFn),
}

impl Check {
    pub fn exists(address: &str) -> Self {
        Check::Exists {
            address: address.into(),
        }
    }

    pub fn attr(address: &str, key: &str, value: impl Into<String>) -> Self {
        Check::Attr {
            address: address.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn no_attr(address: &str, key: &str) -> Self {
        Check::NoAttr {
            address: address.into(),
            key: key.into(),
        }
    }

    pub fn matches(address: &str, key: &str, pattern: &str) -> Self {
        Check::Matches {
            address: address.into(),
            key: key.into(),
            pattern: pattern.into(),
        }
    }

    /// `arn:aws:<service>:<region>:<account>:<resource>` with `resource`
    /// matching `resource_pattern`.
    pub fn regional_arn(
        address: &str,
        key: &str,
        service: &str,
        region: &str,
        resource_pattern: &str,
    ) -> Self {
        Check::matches(
            address,
            key,
            &format!(
                r"^arn:aws:{}:{}:\d{{12}}:{resource_pattern}$",
                regex::escape(service),
                regex::escape(region)
            ),
        )
    }

    pub fn pair(address: &str, key: &str, other_address: &str, other_key: &str) -> Self {
        Check::Pair {
            address: address.into(),
            key: key.into(),
            other_address: other_address.into(),
            other_key: other_key.into(),
        }
    }

    /// The attribute holds a JSON document equal to `json` once both are
    /// parsed.
    pub fn json_equivalent(address: &str, key: &str, json: &str) -> Self {
        Check::JsonEquivalent {
            address: address.into(),
            key: key.into(),
            json: json.into(),
        }
    }

    /// `tags_all`, the resource tags merged with provider default tags,
    /// is exactly `tags`.
    pub fn full_resource_tags(address: &str, tags: &[(&str, &str)]) -> Self {
        Check::FullTags {
            address: address.into(),
            tags: tags.iter().copied().collect(),
        }
    }

    pub fn func(f: impl Fn(&State) -> Result<(), HarnessError> + Send + Sync + 'static) -> Self {
        Check::Func(Box::new(f))
    }

    pub fn evaluate(&self, state: &State) -> Result<(), HarnessError> {
        match self {
            Check::Exists { address } => state.get(address).map(|_| ()),
            Check::Attr {
                address,
                key,
                value,
            } => {
                let actual = lookup(state, address, key)?;
                if actual.as_deref() == Some(value.as_str()) {
                    Ok(())
                } else {
                    Err(mismatch(address, key, value, actual.as_deref()))
                }
            }
            Check::NoAttr { address, key } => match lookup(state, address, key)? {
                None => Ok(()),
                Some(actual) => Err(HarnessError::Check(format!(
                    "{address}: attribute {key} expected to be unset, got {actual:?}"
                ))),
            },
            Check::Matches {
                address,
                key,
                pattern,
            } => {
                let re = Regex::new(pattern)
                    .map_err(|e| HarnessError::Check(format!("bad pattern {pattern:?}: {e}")))?;
                match lookup(state, address, key)? {
                    Some(actual) if re.is_match(&actual) => Ok(()),
                    actual => Err(HarnessError::Check(format!(
                        "{address}: attribute {key} didn't match {pattern:?}, got {actual:?}"
                    ))),
                }
            }
            Check::Pair {
                address,
                key,
                other_address,
                other_key,
            } => {
                let left = lookup(state, address, key)?;
                let right = lookup(state, other_address, other_key)?;
                if left.is_some() && left == right {
                    Ok(())
                } else {
                    Err(HarnessError::Check(format!(
                        "{address}: attribute {key} ({left:?}) doesn't match {other_address}: attribute {other_key} ({right:?})"
                    )))
                }
            }
            Check::JsonEquivalent { address, key, json } => {
                let expected: Value = serde_json::from_str(json).map_err(ProviderError::from)?;
                let actual = lookup(state, address, key)?.unwrap_or_default();
                match serde_json::from_str::<Value>(&actual) {
                    Ok(v) if v == expected => Ok(()),
                    _ => Err(HarnessError::Check(format!(
                        "{address}: attribute {key} is not equivalent to {json}, got {actual}"
                    ))),
                }
            }
            Check::FullTags { address, tags } => {
                let instance = state.get(address)?;
                let actual = TagMap::from_value(
                    "tags_all",
                    instance.get("tags_all").unwrap_or(&Value::Null),
                )
                .map_err(ProviderError::from)?;
                if &actual == tags {
                    Ok(())
                } else {
                    Err(HarnessError::Check(format!(
                        "{address}: tags_all expected {tags:?}, got {actual:?}"
                    )))
                }
            }
            Check::Func(f) => f(state),
        }
    }
}

fn flat(state: &State, address: &str) -> Result<BTreeMap<String, String>, HarnessError> {
    Ok(flatten(&state.get(address)?.attributes))
}

fn lookup(state: &State, address: &str, key: &str) -> Result<Option<String>, HarnessError> {
    Ok(flat(state, address)?.remove(key))
}

fn mismatch(address: &str, key: &str, expected: &str, actual: Option<&str>) -> HarnessError {
    match actual {
        Some(actual) => HarnessError::Check(format!(
            "{address}: attribute {key} expected {expected:?}, got {actual:?}"
        )),
        None => HarnessError::Check(format!(
            "{address}: attribute {key} expected {expected:?}, but it is not set"
        )),
    }
}
