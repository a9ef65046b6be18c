//! Record schemas: the known field shape of each record type.
//!
//! Edits are checked against a schema before they reach a working copy.
//! Field paths are dotted (`metadata.status`) and resolve through nested
//! object definitions; unknown segments are rejected rather than silently
//! added to the document.

pub mod catalog;

use serde_json::Value;

use crate::error::SyncError;

/// Value kind accepted by a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    Bool,
    Number,
    /// Milliseconds since the Unix epoch
    Timestamp,
    List,
    /// Nested object with its own field definitions
    Object(Vec<FieldDef>),
    Any,
}

impl FieldKind {
    /// Short kind name used in error messages and listings.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Bool => "bool",
            FieldKind::Number => "number",
            FieldKind::Timestamp => "timestamp",
            FieldKind::List => "list",
            FieldKind::Object(_) => "object",
            FieldKind::Any => "any",
        }
    }
}

/// A named field and the kind of value it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    /// Whether `null` is an acceptable value
    pub optional: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
        }
    }

    /// Nested object field.
    pub fn object(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self::new(name, FieldKind::Object(fields))
    }

    /// Marks the field as nullable.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Field shape of one record type stored in one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub collection: String,
    pub fields: Vec<FieldDef>,
}

impl RecordSchema {
    /// Creates a schema, rejecting duplicate field names at any level.
    pub fn new(
        name: impl Into<String>,
        collection: impl Into<String>,
        fields: Vec<FieldDef>,
    ) -> Result<Self, SyncError> {
        let schema = Self {
            name: name.into(),
            collection: collection.into(),
            fields,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Checks that no level declares the same field twice.
    pub fn validate(&self) -> Result<(), SyncError> {
        check_unique(&self.name, "", &self.fields)
    }

    /// Resolves a dotted path to its field definition.
    pub fn resolve(&self, path: &str) -> Result<&FieldDef, SyncError> {
        let mut level = &self.fields;
        let mut found: Option<&FieldDef> = None;
        for segment in path.split('.') {
            let def = level
                .iter()
                .find(|f| f.name == segment)
                .ok_or_else(|| self.invalid_field(path))?;
            found = Some(def);
            level = match &def.kind {
                FieldKind::Object(children) => children,
                _ => &EMPTY,
            };
        }
        found.ok_or_else(|| self.invalid_field(path))
    }

    /// Resolves `path` and checks that `value` fits its declared kind.
    ///
    /// Object values are checked key by key against the nested definitions.
    pub fn check_value(&self, path: &str, value: &Value) -> Result<(), SyncError> {
        let def = self.resolve(path)?;
        self.check_def(path, def, value)
    }

    /// Lists every addressable field path with its kind, depth first.
    pub fn field_paths(&self) -> Vec<(String, &FieldKind)> {
        let mut out = Vec::new();
        collect_paths("", &self.fields, &mut out);
        out
    }

    fn check_def(&self, path: &str, def: &FieldDef, value: &Value) -> Result<(), SyncError> {
        if value.is_null() {
            return if def.optional || def.kind == FieldKind::Any {
                Ok(())
            } else {
                Err(mismatch(path, &def.kind, value))
            };
        }

        let accepted = match &def.kind {
            FieldKind::Text => value.is_string(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Number => value.is_number(),
            FieldKind::Timestamp => value.is_i64() || value.is_u64(),
            FieldKind::List => value.is_array(),
            FieldKind::Any => true,
            FieldKind::Object(children) => {
                let Some(map) = value.as_object() else {
                    return Err(mismatch(path, &def.kind, value));
                };
                for (key, child_value) in map {
                    let child_path = format!("{}.{}", path, key);
                    let child = children
                        .iter()
                        .find(|f| &f.name == key)
                        .ok_or_else(|| self.invalid_field(&child_path))?;
                    self.check_def(&child_path, child, child_value)?;
                }
                true
            }
        };

        if accepted {
            Ok(())
        } else {
            Err(mismatch(path, &def.kind, value))
        }
    }

    fn invalid_field(&self, path: &str) -> SyncError {
        SyncError::InvalidField {
            schema: self.name.clone(),
            field: path.to_string(),
        }
    }
}

static EMPTY: Vec<FieldDef> = Vec::new();

fn check_unique(schema: &str, prefix: &str, fields: &[FieldDef]) -> Result<(), SyncError> {
    let mut seen = std::collections::HashSet::new();
    for field in fields {
        let path = join(prefix, &field.name);
        if !seen.insert(field.name.as_str()) {
            return Err(SyncError::DuplicateField {
                schema: schema.to_string(),
                field: path,
            });
        }
        if let FieldKind::Object(children) = &field.kind {
            check_unique(schema, &path, children)?;
        }
    }
    Ok(())
}

fn collect_paths<'a>(prefix: &str, fields: &'a [FieldDef], out: &mut Vec<(String, &'a FieldKind)>) {
    for field in fields {
        let path = join(prefix, &field.name);
        if let FieldKind::Object(children) = &field.kind {
            out.push((path.clone(), &field.kind));
            collect_paths(&path, children, out);
        } else {
            out.push((path, &field.kind));
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn mismatch(path: &str, kind: &FieldKind, value: &Value) -> SyncError {
    let got = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    };
    SyncError::FieldTypeMismatch {
        field: path.to_string(),
        expected: kind.name().to_string(),
        got: got.to_string(),
    }
}
