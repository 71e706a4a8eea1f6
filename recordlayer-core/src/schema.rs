//! Static schema registry describing record types and their fields.
//!
//! A [`Schema`] is declarative data built once at startup through [`SchemaBuilder`]
//! and never mutated afterwards. It is consulted by the query compiler (to know
//! which fields are sequences) and by the record mapper (to normalize array fields).
//!
//! # Example
//!
//! ```ignore
//! use recordlayer::schema::{Schema, FieldDescriptor, FieldKind};
//!
//! let schema = Schema::builder()
//!     .record_type("vocabulary", [
//!         FieldDescriptor::new("name", FieldKind::String),
//!         FieldDescriptor::to_many("translations", "vocabulary").inverse("translations"),
//!         FieldDescriptor::to_one("user", "user").inverse("vocabularies"),
//!     ])
//!     .record_type("user", [
//!         FieldDescriptor::new("email", FieldKind::String),
//!         FieldDescriptor::to_many("vocabularies", "vocabulary").inverse("user"),
//!     ])
//!     .build()?;
//! ```

use std::collections::{BTreeMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AdapterError, AdapterResult},
    record::{ID_FIELD, NATIVE_ID_FIELD},
};

/// Primitive type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Date,
    Object,
    /// Identifier of a record of another (or the same) type.
    Reference,
}

/// Link from a field to another record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// The record type the field points at.
    pub target: String,
    /// Name of the field on the target type that points back, if any.
    pub inverse: Option<String>,
    /// Whether the field holds many identifiers.
    pub is_array: bool,
}

/// Type, array-ness and optional relation metadata for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub is_array: bool,
    pub relation: Option<Relation>,
}

impl FieldDescriptor {
    /// Creates a single-valued field of the given kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self { name: name.into(), kind, is_array: false, relation: None }
    }

    /// Creates a sequence field whose elements are of the given kind.
    pub fn array(name: impl Into<String>, kind: FieldKind) -> Self {
        Self { name: name.into(), kind, is_array: true, relation: None }
    }

    /// Creates a field holding a single identifier of `target`.
    pub fn to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::relation(name.into(), target.into(), false)
    }

    /// Creates a field holding a sequence of identifiers of `target`.
    pub fn to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::relation(name.into(), target.into(), true)
    }

    fn relation(name: String, target: String, is_array: bool) -> Self {
        Self {
            name,
            kind: FieldKind::Reference,
            is_array,
            relation: Some(Relation { target, inverse: None, is_array }),
        }
    }

    /// Names the field on the target type that points back at this one.
    ///
    /// Has no effect on fields that are not relations.
    pub fn inverse(mut self, inverse: impl Into<String>) -> Self {
        if let Some(relation) = self.relation.as_mut() {
            relation.inverse = Some(inverse.into());
        }
        self
    }
}

/// A named entity of the schema with its ordered set of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl RecordType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns `true` if `name` is declared as a sequence field.
    pub fn is_array(&self, name: &str) -> bool {
        self.field(name).is_some_and(|field| field.is_array)
    }

    /// Iterates over the names of all sequence fields.
    pub fn array_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|field| field.is_array)
            .map(|field| field.name.as_str())
    }
}

/// Immutable registry of every record type known to the adapter.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: BTreeMap<String, RecordType>,
}

impl Schema {
    /// Creates a new schema builder.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Looks up a record type by name.
    pub fn record_type(&self, name: &str) -> Option<&RecordType> {
        self.types.get(name)
    }

    /// Looks up a record type by name, failing with [`AdapterError::UnknownRecordType`].
    pub fn get(&self, name: &str) -> AdapterResult<&RecordType> {
        self.record_type(name)
            .ok_or_else(|| AdapterError::UnknownRecordType(name.to_string()))
    }

    /// Iterates over the declared record type names in sorted order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

/// Builder for a validated [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: Vec<RecordType>,
}

impl SchemaBuilder {
    /// Declares a record type with the given fields.
    pub fn record_type(
        mut self,
        name: impl Into<String>,
        fields: impl IntoIterator<Item = FieldDescriptor>,
    ) -> Self {
        self.types.push(RecordType {
            name: name.into(),
            fields: fields.into_iter().collect(),
        });
        self
    }

    /// Validates every declaration and builds the schema.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if a type is declared twice, a field name
    /// is duplicated or reserved, a relation targets an unknown type, or an inverse
    /// field does not point back at the declaring type.
    pub fn build(self) -> AdapterResult<Schema> {
        let mut types = BTreeMap::new();

        for record_type in self.types {
            if types.contains_key(&record_type.name) {
                return Err(AdapterError::Configuration(format!(
                    "record type `{}` is declared more than once",
                    record_type.name
                )));
            }
            types.insert(record_type.name.clone(), record_type);
        }

        for record_type in types.values() {
            let mut seen = HashSet::new();

            for field in &record_type.fields {
                if field.name == ID_FIELD || field.name == NATIVE_ID_FIELD {
                    return Err(AdapterError::Configuration(format!(
                        "field `{}` on `{}` uses a reserved identifier key",
                        field.name, record_type.name
                    )));
                }
                if !seen.insert(field.name.as_str()) {
                    return Err(AdapterError::Configuration(format!(
                        "field `{}` is declared more than once on `{}`",
                        field.name, record_type.name
                    )));
                }
                if let Some(relation) = &field.relation {
                    validate_relation(&types, record_type, field, relation)?;
                }
            }
        }

        Ok(Schema { types })
    }
}

fn validate_relation(
    types: &BTreeMap<String, RecordType>,
    owner: &RecordType,
    field: &FieldDescriptor,
    relation: &Relation,
) -> AdapterResult<()> {
    if field.kind != FieldKind::Reference || field.is_array != relation.is_array {
        return Err(AdapterError::Configuration(format!(
            "relation field `{}.{}` must be a reference with matching array-ness",
            owner.name, field.name
        )));
    }

    let target = types.get(&relation.target).ok_or_else(|| {
        AdapterError::Configuration(format!(
            "relation `{}.{}` targets unknown record type `{}`",
            owner.name, field.name, relation.target
        ))
    })?;

    let Some(inverse) = &relation.inverse else {
        return Ok(());
    };

    let back = target
        .field(inverse)
        .and_then(|back| back.relation.as_ref())
        .ok_or_else(|| {
            AdapterError::Configuration(format!(
                "inverse `{}.{}` of `{}.{}` is not a relation field",
                target.name, inverse, owner.name, field.name
            ))
        })?;

    // The inverse must point at the owner and, when it names its own inverse, name us.
    let points_back = back.target == owner.name
        && back.inverse.as_deref().is_none_or(|name| name == field.name);

    if !points_back {
        return Err(AdapterError::Configuration(format!(
            "inverse `{}.{}` does not point back at `{}.{}`",
            target.name, inverse, owner.name, field.name
        )));
    }

    Ok(())
}
