use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};

use crawlgate_core::schema::{ExtractionField, ExtractionSchema, FieldKind};
use crawlgate_core::SchemaError;

/// Structured extraction driven by a JSON-CSS [`ExtractionSchema`].
///
/// Selectors are compiled once in [`JsonCssExtractor::new`]; an invalid
/// selector is reported as a [`SchemaError`] with the path of its field.
#[derive(Debug)]
pub struct JsonCssExtractor {
    base: Selector,
    base_fields: Vec<CompiledField>,
    fields: Vec<CompiledField>,
}

#[derive(Debug)]
struct CompiledField {
    name: String,
    kind: FieldKind,
    selector: Option<Selector>,
    attribute: Option<String>,
    default: Option<Value>,
    fields: Vec<CompiledField>,
}

impl JsonCssExtractor {
    pub fn new(schema: &ExtractionSchema) -> Result<Self, SchemaError> {
        Ok(Self {
            base: compile_selector(&schema.base_selector, "baseSelector")?,
            base_fields: compile_fields(&schema.base_fields, "baseFields")?,
            fields: compile_fields(&schema.fields, "fields")?,
        })
    }

    /// One JSON object per element matching the base selector.
    pub fn extract(&self, html: &str) -> Vec<Value> {
        let document = Html::parse_document(html);
        self.extract_document(&document)
    }

    pub fn extract_document(&self, document: &Html) -> Vec<Value> {
        document
            .select(&self.base)
            .filter_map(|element| {
                let mut item = Map::new();
                for field in &self.base_fields {
                    if let Some(value) = single_value(element, field) {
                        item.insert(field.name.clone(), value);
                    }
                }
                item.extend(object(element, &self.fields));
                (!item.is_empty()).then_some(Value::Object(item))
            })
            .collect()
    }
}

fn compile_fields(fields: &[ExtractionField], prefix: &str) -> Result<Vec<CompiledField>, SchemaError> {
    fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let path = format!("{prefix}[{index}]");
            let selector = field
                .selector
                .as_deref()
                .map(|s| compile_selector(s, &path))
                .transpose()?;
            Ok(CompiledField {
                name: field.name.clone(),
                kind: field.kind,
                selector,
                attribute: field.attribute.clone(),
                // A null default means "leave the key out".
                default: field.default.clone().filter(|v| !v.is_null()),
                fields: compile_fields(&field.fields, &format!("{path}.fields"))?,
            })
        })
        .collect()
}

fn compile_selector(selector: &str, path: &str) -> Result<Selector, SchemaError> {
    Selector::parse(selector).map_err(|e| SchemaError::Malformed {
        path: path.to_string(),
        message: format!("invalid selector '{selector}': {e}"),
    })
}

/// Evaluate every field against `element`; fields yielding nothing are left out.
fn object(element: ElementRef<'_>, fields: &[CompiledField]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|field| field_value(element, field).map(|v| (field.name.clone(), v)))
        .collect()
}

fn field_value(element: ElementRef<'_>, field: &CompiledField) -> Option<Value> {
    match field.kind {
        FieldKind::Nested => match matches(element, field).next() {
            Some(child) => Some(Value::Object(object(child, &field.fields))),
            None => field.default.clone().or_else(|| Some(Value::Object(Map::new()))),
        },
        FieldKind::List => Some(Value::Array(
            matches(element, field)
                .map(|child| Value::Object(flat_object(child, &field.fields)))
                .collect(),
        )),
        FieldKind::NestedList => Some(Value::Array(
            matches(element, field)
                .map(|child| Value::Object(object(child, &field.fields)))
                .collect(),
        )),
        FieldKind::Text | FieldKind::Html | FieldKind::Attribute => single_value(element, field),
    }
}

/// List items read their children as simple values only.
fn flat_object(element: ElementRef<'_>, fields: &[CompiledField]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|field| single_value(element, field).map(|v| (field.name.clone(), v)))
        .collect()
}

fn single_value(element: ElementRef<'_>, field: &CompiledField) -> Option<Value> {
    let target = match &field.selector {
        Some(selector) => match element.select(selector).next() {
            Some(found) => found,
            None => return field.default.clone(),
        },
        None => element,
    };

    let value = match field.kind {
        FieldKind::Text => Some(element_text(target)),
        FieldKind::Html => Some(target.html()),
        FieldKind::Attribute => field
            .attribute
            .as_deref()
            .and_then(|name| target.value().attr(name))
            .map(str::to_string),
        FieldKind::Nested | FieldKind::List | FieldKind::NestedList => None,
    };

    value.map(Value::String).or_else(|| field.default.clone())
}

/// Matches of the field selector below `element`, or `element` itself when
/// the field has no selector.
fn matches<'a>(
    element: ElementRef<'a>,
    field: &'a CompiledField,
) -> Box<dyn Iterator<Item = ElementRef<'a>> + 'a> {
    match &field.selector {
        Some(selector) => Box::new(element.select(selector)),
        None => Box::new(std::iter::once(element)),
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
