//! Argument schemas and their derivation from declared signatures.
//!
//! A tool function describes itself with a [`Signature`]: its identifier, an
//! optional doc string and an ordered list of [`Param`] declarations. The
//! [`derive`] function turns that declaration into a [`Schema`], one
//! [`ParameterSpec`] per parameter, in declaration order.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::SchemaDerivationError;

/// Primitive kinds an argument can have on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Number,
    String,
    Boolean,
    Object,
    Array,
}

impl ParamKind {
    /// The JSON Schema `type` keyword for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Parse a JSON Schema `type` keyword.
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            _ => None,
        }
    }

    /// Whether `value` conforms to this kind.
    ///
    /// Integers accept floats with no fractional part, since many models
    /// emit `2.0` where `2` was meant.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => true,
                Value::Number(n) => n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0),
                _ => false,
            },
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    /// Check `value` against this kind and bring it into canonical form.
    ///
    /// Integral floats become integer numbers so that tool bodies can read
    /// them as Rust integers.
    pub fn coerce(self, value: Value) -> Result<Value, String> {
        if !self.accepts(&value) {
            return Err(format!("expected {self}, got {}", value_kind(&value)));
        }
        match (self, &value) {
            (Self::Integer, Value::Number(n)) if !(n.is_i64() || n.is_u64()) => n
                .as_f64()
                .and_then(integral_number)
                .map(Value::Number)
                .ok_or_else(|| "integer out of range".to_string()),
            _ => Ok(value),
        }
    }
}

fn integral_number(f: f64) -> Option<Number> {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;
    if (-TWO_POW_63..TWO_POW_63).contains(&f) {
        Some(Number::from(f as i64))
    } else if (0.0..TWO_POW_64).contains(&f) {
        Some(Number::from(f as u64))
    } else {
        None
    }
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the JSON kind of a value, for error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Rust types that can be declared as tool parameters.
///
/// Composite types without a richer representation map to `object`.
pub trait ParamType {
    fn kind() -> ParamKind;

    /// Element kind for sequence types.
    fn items() -> Option<ParamKind> {
        None
    }
}

macro_rules! param_type {
    ($kind:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl ParamType for $ty {
                fn kind() -> ParamKind {
                    $kind
                }
            }
        )+
    };
}

param_type!(ParamKind::Integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
param_type!(ParamKind::Number => f32, f64);
param_type!(ParamKind::String => String, str, char);
param_type!(ParamKind::Boolean => bool);
param_type!(ParamKind::Object => Value, Map<String, Value>);

impl<T: ParamType + ?Sized> ParamType for &T {
    fn kind() -> ParamKind {
        T::kind()
    }

    fn items() -> Option<ParamKind> {
        T::items()
    }
}

impl<T: ParamType> ParamType for Option<T> {
    fn kind() -> ParamKind {
        T::kind()
    }

    fn items() -> Option<ParamKind> {
        T::items()
    }
}

impl<T: ParamType> ParamType for Vec<T> {
    fn kind() -> ParamKind {
        ParamKind::Array
    }

    fn items() -> Option<ParamKind> {
        Some(T::kind())
    }
}

impl<T: ParamType> ParamType for [T] {
    fn kind() -> ParamKind {
        ParamKind::Array
    }

    fn items() -> Option<ParamKind> {
        Some(T::kind())
    }
}

impl<T: ParamType> ParamType for BTreeSet<T> {
    fn kind() -> ParamKind {
        ParamKind::Array
    }

    fn items() -> Option<ParamKind> {
        Some(T::kind())
    }
}

impl<T: ParamType, S> ParamType for HashSet<T, S> {
    fn kind() -> ParamKind {
        ParamKind::Array
    }

    fn items() -> Option<ParamKind> {
        Some(T::kind())
    }
}

impl<V> ParamType for BTreeMap<String, V> {
    fn kind() -> ParamKind {
        ParamKind::Object
    }
}

impl<V, S> ParamType for HashMap<String, V, S> {
    fn kind() -> ParamKind {
        ParamKind::Object
    }
}

/// One declared parameter of a tool function.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    kind: Option<ParamKind>,
    items: Option<ParamKind>,
    description: Option<String>,
    default: Option<Value>,
}

impl Param {
    /// Declare a parameter of Rust type `T`.
    pub fn new<T: ParamType + ?Sized>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Some(T::kind()),
            items: T::items(),
            description: None,
            default: None,
        }
    }

    /// Declare a parameter with an explicit kind.
    pub fn of_kind(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
            items: None,
            description: None,
            default: None,
        }
    }

    /// Declare a parameter without a type.
    ///
    /// Such a parameter can still be bound, but schema derivation rejects it,
    /// so the owning tool needs an explicit [`Schema`].
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            items: None,
            description: None,
            default: None,
        }
    }

    /// Attach a human-readable description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a default value, making the parameter optional.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Option<ParamKind> {
        self.kind
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// The declared shape of a tool function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    ident: String,
    doc: Option<String>,
    params: Vec<Param>,
}

impl Signature {
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            doc: None,
            params: Vec::new(),
        }
    }

    /// Attach the function's documentation text.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Append a parameter declaration.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn doc_text(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Derive the argument schema for this signature.
    pub fn derive_schema(&self) -> Result<Schema, SchemaDerivationError> {
        derive(self)
    }
}

/// Description of a single accepted argument.
///
/// `required` is true exactly when no default is set; the constructors keep
/// that invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    kind: ParamKind,
    description: Option<String>,
    default: Option<Value>,
    required: bool,
    extra: Map<String, Value>,
}

impl ParameterSpec {
    /// A parameter that must be supplied.
    pub fn required(kind: ParamKind) -> Self {
        Self {
            kind,
            description: None,
            default: None,
            required: true,
            extra: Map::new(),
        }
    }

    /// A parameter that falls back to `default` when omitted.
    pub fn optional(kind: ParamKind, default: impl Into<Value>) -> Self {
        Self {
            kind,
            description: None,
            default: Some(default.into()),
            required: false,
            extra: Map::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach an additional schema keyword (`items`, `enum`, ...).
    ///
    /// `type`, `description` and `default` are owned by the spec itself and
    /// are ignored here.
    pub fn keyword(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if !matches!(key.as_str(), "type" | "description" | "default") {
            self.extra.insert(key, value);
        }
        self
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Render this spec as a JSON Schema property.
    pub fn to_json(&self) -> Value {
        let mut property = Map::new();
        property.insert("type".into(), Value::String(self.kind.as_str().into()));
        if let Some(description) = &self.description {
            property.insert("description".into(), Value::String(description.clone()));
        }
        if let Some(default) = &self.default {
            property.insert("default".into(), default.clone());
        }
        for (key, value) in &self.extra {
            property.insert(key.clone(), value.clone());
        }
        Value::Object(property)
    }
}

/// Ordered description of a function's accepted arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    params: Vec<(String, ParameterSpec)>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, spec)| spec)
    }

    /// Parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterSpec)> {
        self.params.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(name, _)| name.as_str())
    }

    /// Names of the parameters without a default, in declaration order.
    pub fn required_names(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, spec)| spec.is_required())
            .map(|(name, _)| name)
            .collect()
    }

    /// Read a schema from a JSON Schema object.
    ///
    /// Accepts the `{"type": "object", "properties": {...}, "required": [...]}`
    /// shape produced by most schema generators. Keywords other than `type`,
    /// `description` and `default` are kept verbatim on each parameter.
    /// A property that is neither required nor defaulted gets a `null`
    /// default.
    pub fn from_json_schema(value: &Value) -> Result<Self, SchemaDerivationError> {
        let object = value
            .as_object()
            .ok_or_else(|| SchemaDerivationError::InvalidSchema("schema must be an object".into()))?;

        if let Some(kind) = object.get("type") {
            if kind != "object" {
                return Err(SchemaDerivationError::InvalidSchema(format!(
                    "top-level type must be \"object\", got {kind}"
                )));
            }
        }

        let required: HashSet<&str> = match object.get("required") {
            None => HashSet::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|name| {
                    name.as_str().ok_or_else(|| {
                        SchemaDerivationError::InvalidSchema("required must list strings".into())
                    })
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(SchemaDerivationError::InvalidSchema(
                    "required must be an array".into(),
                ));
            }
        };

        let properties = match object.get("properties") {
            None => return Ok(Self::default()),
            Some(Value::Object(properties)) => properties,
            Some(_) => {
                return Err(SchemaDerivationError::InvalidSchema(
                    "properties must be an object".into(),
                ));
            }
        };

        let mut builder = Self::builder();
        for (name, property) in properties {
            let property = property.as_object().ok_or_else(|| {
                SchemaDerivationError::InvalidSchema(format!("property '{name}' must be an object"))
            })?;
            let kind = property
                .get("type")
                .and_then(Value::as_str)
                .and_then(ParamKind::parse)
                .ok_or_else(|| {
                    SchemaDerivationError::InvalidSchema(format!(
                        "property '{name}' has no supported type"
                    ))
                })?;

            let mut spec = match property.get("default") {
                Some(default) => ParameterSpec::optional(kind, default.clone()),
                None if required.contains(name.as_str()) => ParameterSpec::required(kind),
                None => ParameterSpec::optional(kind, Value::Null),
            };
            if let Some(description) = property.get("description").and_then(Value::as_str) {
                spec = spec.describe(description);
            }
            for (key, value) in property {
                spec = spec.keyword(key.clone(), value.clone());
            }
            builder = builder.param(name.clone(), spec);
        }
        builder.build()
    }
}

/// Builder for explicit schemas.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    params: Vec<(String, ParameterSpec)>,
}

impl SchemaBuilder {
    pub fn param(mut self, name: impl Into<String>, spec: ParameterSpec) -> Self {
        self.params.push((name.into(), spec));
        self
    }

    pub fn build(self) -> Result<Schema, SchemaDerivationError> {
        let mut seen = HashSet::new();
        for (name, _) in &self.params {
            if !seen.insert(name.as_str()) {
                return Err(SchemaDerivationError::DuplicateParameter {
                    function: "<explicit schema>".into(),
                    parameter: name.clone(),
                });
            }
        }
        Ok(Schema {
            params: self.params,
        })
    }
}

/// Derive a schema from a signature.
///
/// Fails on the first parameter that lacks a type, naming both the function
/// and the parameter.
pub fn derive(signature: &Signature) -> Result<Schema, SchemaDerivationError> {
    let mut seen = HashSet::new();
    let mut params = Vec::with_capacity(signature.params.len());

    for param in &signature.params {
        if !seen.insert(param.name.as_str()) {
            return Err(SchemaDerivationError::DuplicateParameter {
                function: signature.ident.clone(),
                parameter: param.name.clone(),
            });
        }
        let kind = param
            .kind
            .ok_or_else(|| SchemaDerivationError::UntypedParameter {
                function: signature.ident.clone(),
                parameter: param.name.clone(),
            })?;

        let mut spec = match &param.default {
            Some(default) => ParameterSpec::optional(kind, default.clone()),
            None => ParameterSpec::required(kind),
        };
        if let Some(description) = &param.description {
            spec = spec.describe(description.clone());
        }
        if let Some(items) = param.items {
            spec = spec.keyword("items", serde_json::json!({ "type": items.as_str() }));
        }
        params.push((param.name.clone(), spec));
    }

    Ok(Schema { params })
}
