//! Application of update modifiers to in-memory documents.
//!
//! Supports the operators the adapter emits (`$set`, `$push` with `$each`, `$pull`
//! with `$in`) plus the common raw operators callers pass through
//! `Update::operate`: `$unset`, `$inc` and `$addToSet`.

use bson::{Bson, Document};

use recordlayer_core::{
    error::{AdapterError, AdapterResult},
    record::NATIVE_ID_FIELD,
};

use crate::evaluator::Comparable;

/// Applies `modifiers` to `document` and returns `true` if anything changed.
///
/// The document is left untouched when an operator fails.
pub(crate) fn apply_modifiers(document: &mut Document, modifiers: &Document) -> AdapterResult<bool> {
    let mut updated = document.clone();

    for (operator, operand) in modifiers {
        let fields = operand.as_document().ok_or_else(|| {
            AdapterError::Storage(format!("operand of `{operator}` must be a document"))
        })?;

        for (field, value) in fields {
            if field == NATIVE_ID_FIELD {
                return Err(AdapterError::Storage(format!(
                    "`{operator}` would modify the immutable field `{NATIVE_ID_FIELD}`"
                )));
            }

            match operator.as_str() {
                "$set" => {
                    updated.insert(field.clone(), value.clone());
                }
                "$unset" => {
                    updated.remove(field);
                }
                "$inc" => increment(&mut updated, field, value)?,
                "$push" => {
                    let items = each(value);
                    sequence_mut(&mut updated, field)?.extend(items);
                }
                "$addToSet" => {
                    let items = each(value);
                    let sequence = sequence_mut(&mut updated, field)?;
                    for item in items {
                        if !contains(sequence, &item) {
                            sequence.push(item);
                        }
                    }
                }
                "$pull" => pull(&mut updated, field, value)?,
                other => {
                    return Err(AdapterError::Storage(format!("unsupported update operator `{other}`")));
                }
            }
        }
    }

    let changed = updated != *document;
    *document = updated;

    Ok(changed)
}

// `{ $each: [..] }` pushes several values, anything else pushes itself.
fn each(value: &Bson) -> Vec<Bson> {
    match value.as_document().and_then(|d| d.get("$each")) {
        Some(Bson::Array(items)) => items.clone(),
        _ => vec![value.clone()],
    }
}

fn contains(sequence: &[Bson], value: &Bson) -> bool {
    let value = Comparable::from(value);
    sequence.iter().any(|item| Comparable::from(item) == value)
}

fn sequence_mut<'a>(document: &'a mut Document, field: &str) -> AdapterResult<&'a mut Vec<Bson>> {
    if !document.contains_key(field) {
        document.insert(field, Bson::Array(Vec::new()));
    }

    match document.get_mut(field) {
        Some(Bson::Array(items)) => Ok(items),
        _ => Err(AdapterError::Storage(format!("field `{field}` is not a sequence"))),
    }
}

fn pull(document: &mut Document, field: &str, value: &Bson) -> AdapterResult<()> {
    let removed = match value.as_document().and_then(|d| d.get("$in")) {
        Some(Bson::Array(items)) => items.clone(),
        _ => vec![value.clone()],
    };

    match document.get_mut(field) {
        None => Ok(()),
        Some(Bson::Array(items)) => {
            items.retain(|item| !contains(&removed, item));
            Ok(())
        }
        Some(_) => Err(AdapterError::Storage(format!("cannot pull from non-sequence field `{field}`"))),
    }
}

fn increment(document: &mut Document, field: &str, by: &Bson) -> AdapterResult<()> {
    let current = document.get(field).cloned().unwrap_or(Bson::Int32(0));

    let sum = match (&current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(*a as i64 + *b as i64)),
        (Bson::Int32(a), Bson::Int64(b)) => checked_long(field, *a as i64, *b)?,
        (Bson::Int64(a), Bson::Int32(b)) => checked_long(field, *a, *b as i64)?,
        (Bson::Int64(a), Bson::Int64(b)) => checked_long(field, *a, *b)?,
        (Bson::Double(a), Bson::Double(b)) => Bson::Double(a + b),
        (Bson::Double(a), Bson::Int32(b)) => Bson::Double(a + *b as f64),
        (Bson::Double(a), Bson::Int64(b)) => Bson::Double(a + *b as f64),
        (Bson::Int32(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (Bson::Int64(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        _ => {
            return Err(AdapterError::Storage(format!(
                "cannot increment field `{field}` of type {:?} by {by}",
                current.element_type()
            )));
        }
    };

    document.insert(field, sum);
    Ok(())
}

fn checked_long(field: &str, a: i64, b: i64) -> AdapterResult<Bson> {
    a.checked_add(b)
        .map(Bson::Int64)
        .ok_or_else(|| AdapterError::Storage(format!("increment of `{field}` overflows")))
}
