//! Update directives and the store modifiers they translate to.

use bson::{Bson, Document, doc};

use crate::{
    error::{AdapterError, AdapterResult},
    record::{ID_FIELD, NATIVE_ID_FIELD, RecordMapper},
};

/// Requested modifications to one existing record.
///
/// All clauses may be combined. `operate` holds raw store modifiers (e.g.
/// `{"$inc": {"amount": 1}}`) and wins over the derived ones on key collision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub id: Bson,
    /// Fields to overwrite.
    pub replace: Document,
    /// Values to append to sequence fields. A sequence value appends every element.
    pub push: Document,
    /// Values to remove from sequence fields. A sequence value removes every element.
    pub pull: Document,
    pub operate: Document,
}

impl Update {
    pub fn new(id: impl Into<Bson>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    pub fn replace(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.replace.insert(field.into(), value.into());
        self
    }

    pub fn push(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.push.insert(field.into(), value.into());
        self
    }

    pub fn pull(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.pull.insert(field.into(), value.into());
        self
    }

    /// Adds a raw modifier such as `$inc` or `$unset`.
    pub fn operate(mut self, operator: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.operate.insert(operator.into(), value.into());
        self
    }

    /// Builds the store modifiers for this directive.
    ///
    /// An empty result means the directive changes nothing and need not be sent.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidRecord`] if `replace` touches the identifier.
    pub fn modifiers(&self) -> AdapterResult<Document> {
        if self.replace.contains_key(ID_FIELD) || self.replace.contains_key(NATIVE_ID_FIELD) {
            return Err(AdapterError::InvalidRecord(
                "the identifier of a record cannot be replaced".to_string(),
            ));
        }

        let mut modifiers = Document::new();

        if !self.replace.is_empty() {
            modifiers.insert("$set", self.replace.clone());
        }

        if !self.push.is_empty() {
            modifiers.insert("$push", map_sequences(&self.push, "$each"));
        }

        if !self.pull.is_empty() {
            modifiers.insert("$pull", map_sequences(&self.pull, "$in"));
        }

        for (operator, value) in &self.operate {
            modifiers.insert(operator.clone(), value.clone());
        }

        Ok(modifiers)
    }
}

// Wraps sequence values in `{ <operator>: [...] }` so they apply element-wise.
fn map_sequences(fields: &Document, operator: &str) -> Document {
    fields
        .iter()
        .map(|(field, value)| {
            let value = match value {
                Bson::Array(values) => Bson::Document(doc! { operator: values.clone() }),
                value => value.clone(),
            };
            (RecordMapper::native_field(field).to_string(), value)
        })
        .collect()
}
