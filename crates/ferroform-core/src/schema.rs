use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::attrs::{Attributes, type_name};
use crate::error::CoreError;

/// Attribute names shared by several resource types.
pub mod attr {
    pub const ID: &str = "id";
    pub const ARN: &str = "arn";
    pub const DESCRIPTION: &str = "description";
    pub const ENABLED: &str = "enabled";
    pub const NAME: &str = "name";
    pub const POLICY: &str = "policy";
    pub const TAGS: &str = "tags";
    pub const TAGS_ALL: &str = "tags_all";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    String,
    Bool,
    Int,
    StringList,
    TagMap,
}

impl AttrType {
    fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (AttrType::String, Value::String(_)) => true,
            (AttrType::Bool, Value::Bool(_)) => true,
            (AttrType::Int, Value::Number(n)) => n.is_i64(),
            (AttrType::StringList, Value::Array(items)) => items.iter().all(Value::is_string),
            (AttrType::TagMap, Value::Object(obj)) => obj.values().all(Value::is_string),
            _ => false,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            AttrType::String => "string",
            AttrType::Bool => "bool",
            AttrType::Int => "int",
            AttrType::StringList => "list of string",
            AttrType::TagMap => "map of string",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Must be set in configuration.
    Required,
    /// May be set; unset means the default (or null).
    Optional,
    /// May be set; unset means "whatever the remote side has".
    OptionalComputed,
    /// Set by the remote side only.
    Computed,
}

/// Default value of an optional attribute. Const-constructible so schemas
/// can live in statics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl DefaultValue {
    pub fn to_value(self) -> Value {
        match self {
            DefaultValue::Bool(b) => json!(b),
            DefaultValue::Int(i) => json!(i),
            DefaultValue::Str(s) => json!(s),
        }
    }
}

/// How two values of an attribute are compared when diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Exact,
    /// Strings holding JSON documents compare by parsed value, so key order
    /// and whitespace never produce a change.
    Json,
}

pub type Validator = fn(&Value) -> Result<(), String>;

/// One attribute of a resource schema.
#[derive(Debug, Clone, Copy)]
pub struct Attribute {
    pub name: &'static str,
    pub label: &'static str,
    pub ty: AttrType,
    pub mode: Mode,
    pub force_new: bool,
    pub default: Option<DefaultValue>,
    /// False for configuration-only attributes that cannot be recovered by
    /// reading the remote resource (import fills their defaults instead).
    pub importable: bool,
    /// Excluded from diffing; another attribute carries the comparison.
    pub skip_diff: bool,
    pub compare: Compare,
    pub validator: Option<Validator>,
}

impl Attribute {
    const fn new(name: &'static str, ty: AttrType, mode: Mode) -> Self {
        Self {
            name,
            label: name,
            ty,
            mode,
            force_new: false,
            default: None,
            importable: true,
            skip_diff: false,
            compare: Compare::Exact,
            validator: None,
        }
    }

    pub const fn required(name: &'static str, ty: AttrType) -> Self {
        Self::new(name, ty, Mode::Required)
    }

    pub const fn optional(name: &'static str, ty: AttrType) -> Self {
        Self::new(name, ty, Mode::Optional)
    }

    pub const fn optional_computed(name: &'static str, ty: AttrType) -> Self {
        Self::new(name, ty, Mode::OptionalComputed)
    }

    pub const fn computed(name: &'static str, ty: AttrType) -> Self {
        Self::new(name, ty, Mode::Computed)
    }

    /// `tags`: configured tags, compared through `tags_all`.
    pub const fn tags() -> Self {
        let mut a = Self::new(crate::schema::attr::TAGS, AttrType::TagMap, Mode::Optional);
        a.label = "Tags";
        a.skip_diff = true;
        a
    }

    /// `tags_all`: configured tags merged with provider default tags.
    pub const fn tags_all() -> Self {
        let mut a = Self::new(
            crate::schema::attr::TAGS_ALL,
            AttrType::TagMap,
            Mode::Computed,
        );
        a.label = "Tags (including provider defaults)";
        a
    }

    pub const fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub const fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub const fn default_value(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    pub const fn not_importable(mut self) -> Self {
        self.importable = false;
        self
    }

    pub const fn compare(mut self, compare: Compare) -> Self {
        self.compare = compare;
        self
    }

    pub const fn validate_with(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    fn equivalent(&self, a: &Value, b: &Value) -> bool {
        match (self.compare, a, b) {
            (Compare::Json, Value::String(a), Value::String(b)) => {
                match (
                    serde_json::from_str::<Value>(a),
                    serde_json::from_str::<Value>(b),
                ) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => a == b,
                }
            }
            _ => a == b,
        }
    }
}

/// Structured before/after for a single attribute that differs between
/// prior (remote) state and desired configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDrift {
    /// Machine-readable attribute name, e.g. "description"
    pub field: String,
    /// Human-readable label
    pub label: String,
    /// What configuration wants
    pub expected: Value,
    /// What the resource has
    pub actual: Value,
    /// Changing this attribute means destroy + recreate
    pub forces_replacement: bool,
}

/// Attribute-level delta between prior state and desired configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub drifts: Vec<FieldDrift>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.drifts.is_empty()
    }

    pub fn requires_replacement(&self) -> bool {
        self.drifts.iter().any(|d| d.forces_replacement)
    }

    pub fn has_change(&self, field: &str) -> bool {
        self.drifts.iter().any(|d| d.field == field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldDrift> {
        self.drifts.iter().find(|d| d.field == field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.drifts.iter().map(|d| d.field.as_str())
    }
}

/// Static declaration of a resource type's attributes.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub type_name: &'static str,
    pub attributes: &'static [Attribute],
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check a configuration object against the schema before any API call.
    ///
    /// Rejects unknown attributes, values for computed-only attributes, type
    /// mismatches, missing required attributes, and whatever the
    /// per-attribute validators reject.
    pub fn validate(&self, config: &Value) -> Result<Attributes, CoreError> {
        let obj = config
            .as_object()
            .ok_or_else(|| CoreError::NotAnObject(type_name(config).into()))?;

        for (name, value) in obj {
            let attr = self
                .attribute(name)
                .ok_or_else(|| CoreError::UnknownAttribute(format!("{}.{name}", self.type_name)))?;

            if attr.mode == Mode::Computed && !value.is_null() {
                return Err(CoreError::ComputedAttribute(name.clone()));
            }
            if !attr.ty.accepts(value) {
                return Err(CoreError::TypeMismatch {
                    name: name.clone(),
                    expected: attr.ty.describe().into(),
                    actual: type_name(value).into(),
                });
            }
            if let (Some(validate), false) = (attr.validator, value.is_null()) {
                validate(value).map_err(|reason| CoreError::InvalidValue {
                    name: name.clone(),
                    reason,
                })?;
            }
        }

        for attr in self.attributes.iter().filter(|a| a.mode == Mode::Required) {
            if obj.get(attr.name).is_none_or(Value::is_null) {
                return Err(CoreError::MissingAttribute(attr.name.into()));
            }
        }

        Ok(obj.clone())
    }

    /// Fill absent or null optional attributes with their defaults.
    pub fn apply_defaults(&self, attrs: &mut Attributes) {
        for attr in self.attributes {
            if let Some(default) = attr.default {
                let unset = attrs.get(attr.name).is_none_or(Value::is_null);
                if unset {
                    attrs.insert(attr.name.into(), default.to_value());
                }
            }
        }
    }

    /// Defaults for attributes that a remote read cannot recover.
    pub fn apply_import_defaults(&self, attrs: &mut Attributes) {
        for attr in self.attributes.iter().filter(|a| !a.importable) {
            if let Some(default) = attr.default {
                attrs
                    .entry(attr.name)
                    .or_insert_with(|| default.to_value());
            }
        }
    }

    /// Copy configuration-only attributes from `prior` into a freshly read
    /// attribute object, which cannot contain them.
    pub fn carry_forward(&self, prior: &Attributes, refreshed: &mut Attributes) {
        for attr in self.attributes.iter().filter(|a| !a.importable) {
            if let Some(value) = prior.get(attr.name) {
                refreshed
                    .entry(attr.name)
                    .or_insert_with(|| value.clone());
            }
        }
    }

    /// Attribute-level delta from `prior` to `desired`.
    ///
    /// Computed attributes only take part when `desired` carries a value
    /// for them (e.g. `tags_all` after default-tag merging). Unset
    /// optional-computed attributes accept whatever the remote side has.
    pub fn diff(&self, prior: &Attributes, desired: &Attributes) -> Delta {
        let mut drifts = Vec::new();

        for attr in self.attributes.iter().filter(|a| !a.skip_diff) {
            let wanted = desired.get(attr.name).filter(|v| !v.is_null());
            let wanted = match (attr.mode, wanted) {
                (Mode::Computed | Mode::OptionalComputed, None) => continue,
                (_, Some(v)) => v.clone(),
                (_, None) => attr.default.map_or(Value::Null, DefaultValue::to_value),
            };
            let actual = prior.get(attr.name).cloned().unwrap_or(Value::Null);

            let both_empty = is_empty_value(&wanted) && is_empty_value(&actual);
            if !attr.equivalent(&wanted, &actual) && !both_empty {
                drifts.push(FieldDrift {
                    field: attr.name.into(),
                    label: attr.label.into(),
                    expected: wanted,
                    actual,
                    forces_replacement: attr.force_new,
                });
            }
        }

        Delta { drifts }
    }
}

/// Null, empty list and empty map are interchangeable.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
