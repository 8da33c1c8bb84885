//! Schema collaborator.
//!
//! [`SchemaProvider`] is the seam the builder and loader validate against.
//! [`GraphSchema`] is a plain in-memory implementation with per-field type and
//! presence checks, deserializable from JSON or TOML.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::FieldError;

/// Record field carrying an edge's source identifier.
pub const EDGE_FROM_FIELD: &str = "from";
/// Record field carrying an edge's target identifier.
pub const EDGE_TO_FIELD: &str = "to";
/// Identifier property used when a vertex definition does not name one.
pub const DEFAULT_ID_PROPERTY: &str = "id";

/// Value type accepted by a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    /// UTF-8 string.
    String,
    /// Whole number.
    Integer,
    /// Any finite number.
    Number,
    /// `true` / `false`.
    Boolean,
    /// Nested object.
    Object,
    /// Array of any values.
    Array,
    /// No type restriction.
    Any,
}

impl PropertyType {
    fn accepts(self, value: &JsonValue) -> bool {
        match self {
            PropertyType::String => value.is_string(),
            PropertyType::Integer => value.is_i64() || value.is_u64(),
            PropertyType::Number => value.is_number(),
            PropertyType::Boolean => value.is_boolean(),
            PropertyType::Object => value.is_object(),
            PropertyType::Array => value.is_array(),
            PropertyType::Any => true,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Number => "number",
            PropertyType::Boolean => "boolean",
            PropertyType::Object => "object",
            PropertyType::Array => "array",
            PropertyType::Any => "any",
        };
        f.write_str(name)
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_f64() => "number",
        JsonValue::Number(_) => "integer",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Declared property of a vertex or edge label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Property name.
    pub name: String,
    /// Accepted value type.
    #[serde(rename = "type", default = "any_type")]
    pub ty: PropertyType,
    /// Whether records must carry a non-null value.
    #[serde(default)]
    pub required: bool,
}

fn any_type() -> PropertyType {
    PropertyType::Any
}

impl PropertyDefinition {
    /// Optional property of the given type.
    pub fn optional(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
        }
    }

    /// Required property of the given type.
    pub fn required(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
        }
    }
}

/// Vertex label definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexDefinition {
    /// Property that uniquely identifies a vertex of this label.
    #[serde(default = "default_id_property")]
    pub id_property: String,
    /// Declared properties.
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

fn default_id_property() -> String {
    DEFAULT_ID_PROPERTY.to_owned()
}

impl Default for VertexDefinition {
    fn default() -> Self {
        Self {
            id_property: default_id_property(),
            properties: Vec::new(),
        }
    }
}

impl VertexDefinition {
    /// Creates a definition identified by `id`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the identifier property.
    pub fn id_property(mut self, name: impl Into<String>) -> Self {
        self.id_property = name.into();
        self
    }

    /// Declares a property.
    pub fn property(mut self, def: PropertyDefinition) -> Self {
        self.properties.push(def);
        self
    }
}

/// Edge label definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    /// Source vertex label.
    pub from: String,
    /// Target vertex label.
    pub to: String,
    /// Declared properties.
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

impl EdgeDefinition {
    /// Creates an edge definition between two vertex labels.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            properties: Vec::new(),
        }
    }

    /// Declares a property.
    pub fn property(mut self, def: PropertyDefinition) -> Self {
        self.properties.push(def);
        self
    }
}

/// Schema information consumed by the query builder and the batch loader.
pub trait SchemaProvider: Send + Sync {
    /// All vertex labels.
    fn vertex_labels(&self) -> Vec<String>;
    /// All edge labels.
    fn edge_labels(&self) -> Vec<String>;
    /// Declared properties of a vertex or edge label.
    fn property_definitions(&self, label: &str) -> Option<&[PropertyDefinition]>;
    /// Validates a record against the label's rules.
    fn validate(&self, label: &str, record: &Map<String, JsonValue>) -> Vec<FieldError>;
    /// Identifier property of a vertex label.
    fn id_property(&self, label: &str) -> Option<&str>;
    /// Source and target vertex labels of an edge label.
    fn edge_endpoints(&self, label: &str) -> Option<(&str, &str)>;

    /// Returns true when `label` is a vertex label.
    fn is_vertex_label(&self, label: &str) -> bool {
        self.vertex_labels().iter().any(|l| l == label)
    }

    /// Returns true when `label` is an edge label.
    fn is_edge_label(&self, label: &str) -> bool {
        self.edge_labels().iter().any(|l| l == label)
    }
}

/// In-memory schema.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSchema {
    /// Vertex definitions keyed by label.
    #[serde(default)]
    pub vertices: BTreeMap<String, VertexDefinition>,
    /// Edge definitions keyed by label.
    #[serde(default)]
    pub edges: BTreeMap<String, EdgeDefinition>,
    /// Accept record fields that are not declared as properties.
    #[serde(default)]
    pub allow_undeclared: bool,
}

impl GraphSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex label.
    pub fn vertex(mut self, label: impl Into<String>, def: VertexDefinition) -> Self {
        self.vertices.insert(label.into(), def);
        self
    }

    /// Adds an edge label.
    pub fn edge(mut self, label: impl Into<String>, def: EdgeDefinition) -> Self {
        self.edges.insert(label.into(), def);
        self
    }

    /// Accepts fields that are not declared as properties.
    pub fn allow_undeclared(mut self, allow: bool) -> Self {
        self.allow_undeclared = allow;
        self
    }

    fn check_properties(
        &self,
        props: &[PropertyDefinition],
        record: &Map<String, JsonValue>,
        reserved: &[&str],
        out: &mut Vec<FieldError>,
    ) {
        for def in props {
            match record.get(&def.name) {
                None | Some(JsonValue::Null) if def.required => {
                    out.push(FieldError::new(&def.name, "is required"));
                }
                None | Some(JsonValue::Null) => {}
                Some(value) if !def.ty.accepts(value) => out.push(FieldError::new(
                    &def.name,
                    format!("expected {}, found {}", def.ty, json_type_name(value)),
                )),
                Some(_) => {}
            }
        }
        if self.allow_undeclared {
            return;
        }
        for field in record.keys() {
            if reserved.contains(&field.as_str()) {
                continue;
            }
            if !props.iter().any(|def| &def.name == field) {
                out.push(FieldError::new(field, "is not a declared property"));
            }
        }
    }
}

impl SchemaProvider for GraphSchema {
    fn vertex_labels(&self) -> Vec<String> {
        self.vertices.keys().cloned().collect()
    }

    fn edge_labels(&self) -> Vec<String> {
        self.edges.keys().cloned().collect()
    }

    fn property_definitions(&self, label: &str) -> Option<&[PropertyDefinition]> {
        self.vertices
            .get(label)
            .map(|v| v.properties.as_slice())
            .or_else(|| self.edges.get(label).map(|e| e.properties.as_slice()))
    }

    fn validate(&self, label: &str, record: &Map<String, JsonValue>) -> Vec<FieldError> {
        let mut out = Vec::new();
        if let Some(def) = self.vertices.get(label) {
            let reserved = [def.id_property.as_str()];
            self.check_properties(&def.properties, record, &reserved, &mut out);
        } else if let Some(def) = self.edges.get(label) {
            self.check_properties(
                &def.properties,
                record,
                &[EDGE_FROM_FIELD, EDGE_TO_FIELD],
                &mut out,
            );
        } else {
            out.push(FieldError::new(label, "unknown label"));
        }
        out
    }

    fn id_property(&self, label: &str) -> Option<&str> {
        self.vertices.get(label).map(|v| v.id_property.as_str())
    }

    fn edge_endpoints(&self, label: &str) -> Option<(&str, &str)> {
        self.edges
            .get(label)
            .map(|e| (e.from.as_str(), e.to.as_str()))
    }

    fn is_vertex_label(&self, label: &str) -> bool {
        self.vertices.contains_key(label)
    }

    fn is_edge_label(&self, label: &str) -> bool {
        self.edges.contains_key(label)
    }
}
