//! Declarative extraction schema: which DOM nodes become which JSON keys.
//!
//! The wire shape is the JSON-CSS schema format:
//!
//! ```json
//! {
//!   "name": "Product List",
//!   "baseSelector": "div.product-card",
//!   "baseFields": [{"name": "id", "type": "attribute", "attribute": "data-id"}],
//!   "fields": [
//!     {"name": "title", "selector": "h2", "type": "text"},
//!     {"name": "details", "selector": "div.details", "type": "nested",
//!      "fields": [{"name": "brand", "selector": ".brand", "type": "text"}]}
//!   ]
//! }
//! ```
//!
//! Schemas are built once per request by [`ExtractionSchema::from_value`] and
//! never mutated afterwards.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use scraper::Selector;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SchemaError;

/// Maximum nesting of `fields` lists below the schema root.
pub const MAX_FIELD_DEPTH: usize = 32;

/// What an [`ExtractionField`] reads from the element it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Trimmed text content.
    Text,
    /// Outer HTML of the matched element.
    Html,
    /// A single attribute value.
    Attribute,
    /// First match becomes a sub-object.
    Nested,
    /// Every match becomes a flat object of simple values.
    List,
    /// Every match becomes a full sub-object.
    NestedList,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Html => "html",
            FieldKind::Attribute => "attribute",
            FieldKind::Nested => "nested",
            FieldKind::List => "list",
            FieldKind::NestedList => "nested_list",
        }
    }

    /// Composite kinds carry child `fields`.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            FieldKind::Nested | FieldKind::List | FieldKind::NestedList
        )
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(FieldKind::Text),
            "html" => Ok(FieldKind::Html),
            "attribute" => Ok(FieldKind::Attribute),
            "nested" => Ok(FieldKind::Nested),
            "list" => Ok(FieldKind::List),
            "nested_list" => Ok(FieldKind::NestedList),
            other => Err(format!("unknown field type: {other}")),
        }
    }
}

/// One named extraction rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "openapi", schema(example = json!({
    "name": "details",
    "selector": "div.product-details",
    "type": "nested",
    "fields": [{"name": "brand", "selector": "span.brand", "type": "text"}]
})))]
pub struct ExtractionField {
    /// Key in the resulting JSON object.
    pub name: String,
    /// CSS selector relative to the parent element. Absent means the parent itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Attribute to read when `type` is `attribute`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Value used when nothing matches. An explicit `null` is kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Non-empty iff `kind.is_composite()`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[cfg_attr(feature = "openapi", schema(no_recursion))]
    pub fields: Vec<ExtractionField>,
}

/// Root of one extraction task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "openapi", schema(example = json!({
    "name": "Product List",
    "baseSelector": "div.product-card",
    "baseFields": [{"name": "product_id", "type": "attribute", "attribute": "data-product-id"}],
    "fields": [
        {"name": "title", "selector": "h2.product-title", "type": "text"},
        {"name": "price", "selector": "span.price", "type": "text", "default": "0"}
    ]
})))]
pub struct ExtractionSchema {
    pub name: String,
    #[serde(rename = "baseSelector")]
    pub base_selector: String,
    /// Read once per base container, against the container itself.
    #[serde(rename = "baseFields", skip_serializing_if = "Vec::is_empty")]
    pub base_fields: Vec<ExtractionField>,
    pub fields: Vec<ExtractionField>,
}

impl ExtractionSchema {
    /// Build a schema from its wire representation.
    ///
    /// Fails with a [`SchemaError`] carrying the path of the first offending
    /// node. Children are built depth-first in document order.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let map = value
            .as_object()
            .ok_or_else(|| malformed("", "extraction schema must be an object"))?;

        let name = required_str(map, "name", "")?;
        let base_selector = required_str(map, "baseSelector", "")?;
        check_selector(&base_selector, "baseSelector")?;

        let base_fields = match map.get("baseFields") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => build_list(items, "", "baseFields", 1)?,
            Some(_) => return Err(malformed("baseFields", "must be a list")),
        };

        let fields = match map.get("fields") {
            Some(Value::Array(items)) => build_list(items, "", "fields", 1)?,
            Some(_) => return Err(malformed("fields", "must be a list")),
            None => return Err(malformed("fields", "is required")),
        };

        Ok(Self {
            name,
            base_selector,
            base_fields,
            fields,
        })
    }

    /// Serialize back to the wire representation.
    pub fn to_value(&self) -> Value {
        // Every member serializes infallibly (strings, enums and JSON values).
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Total number of field nodes, base fields included.
    pub fn node_count(&self) -> usize {
        fn count(fields: &[ExtractionField]) -> usize {
            fields.iter().map(|f| 1 + count(&f.fields)).sum()
        }
        count(&self.base_fields) + count(&self.fields)
    }
}

fn build_list(
    items: &[Value],
    parent: &str,
    key: &str,
    depth: usize,
) -> Result<Vec<ExtractionField>, SchemaError> {
    let mut seen = HashSet::with_capacity(items.len());
    let mut fields = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let path = child_path(parent, key, index);
        let field = build_field(item, &path, depth)?;
        if !seen.insert(field.name.clone()) {
            return Err(SchemaError::DuplicateName {
                path,
                name: field.name,
            });
        }
        fields.push(field);
    }

    Ok(fields)
}

fn build_field(value: &Value, path: &str, depth: usize) -> Result<ExtractionField, SchemaError> {
    if depth > MAX_FIELD_DEPTH {
        return Err(SchemaError::TooDeep {
            path: path.to_string(),
            limit: MAX_FIELD_DEPTH,
        });
    }

    let map = value
        .as_object()
        .ok_or_else(|| malformed(path, "field must be an object"))?;

    let name = required_str(map, "name", path)?;
    let literal = required_str(map, "type", path)?;
    let kind: FieldKind = literal.parse().map_err(|_| SchemaError::UnknownType {
        path: path.to_string(),
        found: literal.clone(),
    })?;

    let selector = optional_str(map, "selector", path)?;
    if let Some(selector) = &selector {
        check_selector(selector, path)?;
    }
    let attribute = optional_str(map, "attribute", path)?;
    let default = map.get("default").cloned();

    if kind == FieldKind::Attribute && attribute.as_deref().is_none_or(str::is_empty) {
        return Err(SchemaError::MissingAttributeName {
            path: path.to_string(),
        });
    }

    let fields = if kind.is_composite() {
        match map.get("fields") {
            Some(Value::Array(items)) if !items.is_empty() => {
                build_list(items, path, "fields", depth + 1)?
            }
            Some(Value::Array(_)) | Some(Value::Null) | None => {
                return Err(SchemaError::MissingChildren {
                    path: path.to_string(),
                    kind: kind.to_string(),
                });
            }
            Some(_) => return Err(malformed(path, "'fields' must be a list")),
        }
    } else {
        // Children on simple kinds are ignored.
        Vec::new()
    };

    Ok(ExtractionField {
        name,
        selector,
        kind,
        attribute,
        default,
        fields,
    })
}

/// Selectors must compile here so a bad one never reaches an engine.
fn check_selector(selector: &str, path: &str) -> Result<(), SchemaError> {
    Selector::parse(selector)
        .map(drop)
        .map_err(|e| SchemaError::Malformed {
            path: path.to_string(),
            message: format!("invalid selector '{selector}': {e}"),
        })
}

fn child_path(parent: &str, key: &str, index: usize) -> String {
    if parent.is_empty() {
        format!("{key}[{index}]")
    } else {
        format!("{parent}.{key}[{index}]")
    }
}

fn required_str(map: &Map<String, Value>, key: &str, path: &str) -> Result<String, SchemaError> {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(malformed(path, &format!("'{key}' must not be empty"))),
        Some(_) => Err(malformed(path, &format!("'{key}' must be a string"))),
        None => Err(malformed(path, &format!("'{key}' is required"))),
    }
}

fn optional_str(
    map: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<String>, SchemaError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(malformed(path, &format!("'{key}' must be a string"))),
    }
}

fn malformed(path: &str, message: &str) -> SchemaError {
    SchemaError::Malformed {
        path: if path.is_empty() {
            "schema".to_string()
        } else {
            path.to_string()
        },
        message: message.to_string(),
    }
}
