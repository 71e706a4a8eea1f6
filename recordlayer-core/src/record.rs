//! Application records and their mapping to and from stored documents.
//!
//! A [`Record`] is what callers of the adapter see: a mapping of field names to
//! BSON values with its identifier under [`ID_FIELD`]. The [`RecordMapper`] turns
//! a record into the store-native document (identifier under [`NATIVE_ID_FIELD`])
//! and back, normalizing declared sequence fields so they never come back missing.

use bson::{Bson, Document, deserialize_from_bson, serialize_to_bson};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, to_value};

use crate::{
    error::{AdapterError, AdapterResult},
    schema::RecordType,
};

/// Reserved key holding a record's identifier.
pub const ID_FIELD: &str = "id";

/// Key holding a document's identifier inside the store.
pub const NATIVE_ID_FIELD: &str = "_id";

/// A record as exchanged with callers of the adapter.
///
/// Records serialize transparently as their underlying document, so they can be
/// handed straight to a serialization layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Document);

impl Record {
    /// Creates an empty record without an identifier.
    pub fn new() -> Self {
        Self(Document::new())
    }

    /// Creates an empty record with the given identifier.
    pub fn with_id(id: impl Into<Bson>) -> Self {
        let mut document = Document::new();
        document.insert(ID_FIELD, id.into());
        Self(document)
    }

    /// Builder-style insertion of a field value.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Returns the identifier, treating an explicit null as absent.
    pub fn id(&self) -> Option<&Bson> {
        self.0.get(ID_FIELD).filter(|id| !matches!(id, Bson::Null))
    }

    pub(crate) fn set_id(&mut self, id: Bson) {
        self.0.insert(ID_FIELD, id);
    }

    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.0.get(field)
    }

    /// Returns the sequence stored under `field`, if it is one.
    pub fn get_array(&self, field: &str) -> Option<&Vec<Bson>> {
        self.0.get_array(field).ok()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Bson>) -> Option<Bson> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Bson> {
        self.0.remove(field)
    }

    /// Returns the record's fields, identifier included.
    pub fn fields(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }

    /// Builds a record from any serializable value that serializes to a document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the value is not a document.
    pub fn from_serializable<T: Serialize>(value: &T) -> AdapterResult<Self> {
        match serialize_to_bson(value)? {
            Bson::Document(document) => Ok(Self(document)),
            other => Err(AdapterError::InvalidRecord(format!(
                "expected a document, got {:?}",
                other.element_type()
            ))),
        }
    }

    /// Deserializes this record into a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not match the shape of `T`.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> AdapterResult<T> {
        Ok(deserialize_from_bson(Bson::Document(self.0.clone()))?)
    }

    /// Converts this record to a JSON value.
    pub fn to_json(&self) -> AdapterResult<Value> {
        Ok(to_value(&self.0)?)
    }
}

impl From<Document> for Record {
    fn from(document: Document) -> Self {
        Self(document)
    }
}

impl From<Record> for Document {
    fn from(record: Record) -> Self {
        record.0
    }
}

/// Converts records to stored documents and back.
pub struct RecordMapper;

impl RecordMapper {
    /// Translates a caller-facing field name to its name inside the store.
    pub fn native_field(field: &str) -> &str {
        if field == ID_FIELD { NATIVE_ID_FIELD } else { field }
    }

    /// Converts a record into its stored form.
    ///
    /// The identifier moves from [`ID_FIELD`] to [`NATIVE_ID_FIELD`] (placed first);
    /// all other fields are copied verbatim, unknown ones included. A caller
    /// field named [`NATIVE_ID_FIELD`] is dropped.
    pub fn to_document(_record_type: &RecordType, record: &Record) -> Document {
        let mut document = Document::new();

        if let Some(id) = record.id() {
            document.insert(NATIVE_ID_FIELD, id.clone());
        }

        for (key, value) in record.fields() {
            if key != ID_FIELD && key != NATIVE_ID_FIELD {
                document.insert(key.clone(), value.clone());
            }
        }

        document
    }

    /// Converts a stored document back into a record.
    ///
    /// Declared sequence fields that are absent or null come back as empty sequences.
    pub fn to_record(record_type: &RecordType, document: Document) -> Record {
        let mut fields = Document::new();

        for (key, value) in document {
            if key == NATIVE_ID_FIELD {
                fields.insert(ID_FIELD, value);
            } else {
                fields.insert(key, value);
            }
        }

        for field in record_type.array_fields() {
            if matches!(fields.get(field), None | Some(Bson::Null)) {
                fields.insert(field, Bson::Array(Vec::new()));
            }
        }

        Record(fields)
    }
}
