//! Query expression evaluation for in-memory document filtering.
//!
//! This module provides the evaluation engine for filter expressions and the
//! ordering used for sorting, following the document-database conventions the
//! adapter relies on: comparisons against a sequence field match when any element
//! matches, and a missing field compares as null.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime};

use recordlayer_core::{
    error::{AdapterError, AdapterResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to `f64` so `Int32(1)` equals `Double(1.0)`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Any other BSON value, compared by exact equality.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl<'a> Comparable<'a> {
    // Cross-type sort order: null, numbers, strings, objects, arrays, other, booleans, dates.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Other(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Total order used for sorting.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }

    /// Equality where a sequence also matches when one of its elements does.
    fn matches(&self, value: &Comparable<'_>) -> bool {
        if self == value {
            return true;
        }
        match self {
            Comparable::Array(items) => items.iter().any(|item| item == value),
            _ => false,
        }
    }

    /// Ordering test where a sequence matches when one of its elements does.
    fn satisfies(&self, value: &Comparable<'_>, accept: impl Fn(Ordering) -> bool + Copy) -> bool {
        match self {
            Comparable::Array(items) => items.iter().any(|item| item.satisfies(value, accept)),
            _ => self.partial_cmp(value).is_some_and(accept),
        }
    }
}

fn candidates<'v>(field: &str, value: Comparable<'v>) -> AdapterResult<Vec<Comparable<'v>>> {
    match value {
        Comparable::Array(values) => Ok(values),
        _ => Err(AdapterError::Storage(format!(
            "membership test on `{field}` requires a sequence of values"
        ))),
    }
}

/// Looks up a possibly dotted field path inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> AdapterResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns `true` if `document` matches `filter` (every document matches `None`).
    pub fn matches(document: &Document, filter: Option<&Expr>) -> AdapterResult<bool> {
        match filter {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
            None => Ok(true),
        }
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = AdapterError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_length(&mut self, field: &str, min: Option<u64>, max: Option<u64>) -> Result<Self::Output, Self::Error> {
        let length = match lookup(self.document, field) {
            None | Some(Bson::Null) => 0,
            Some(Bson::Array(items)) => items.len() as u64,
            // A scalar is not a sequence and never satisfies a length bound.
            Some(_) => return Ok(false),
        };

        Ok(min.is_none_or(|min| length >= min) && max.is_none_or(|max| length <= max))
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let null = Bson::Null;
        let field_value = Comparable::from(lookup(self.document, field).unwrap_or(&null));
        let value = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => field_value.matches(&value),
            FieldOp::Ne => !field_value.matches(&value),
            FieldOp::Gt => field_value.satisfies(&value, |o| o == Ordering::Greater),
            FieldOp::Gte => field_value.satisfies(&value, |o| o != Ordering::Less),
            FieldOp::Lt => field_value.satisfies(&value, |o| o == Ordering::Less),
            FieldOp::Lte => field_value.satisfies(&value, |o| o != Ordering::Greater),
            FieldOp::AnyOf => candidates(field, value)?
                .iter()
                .any(|candidate| field_value.matches(candidate)),
            FieldOp::NoneOf => !candidates(field, value)?
                .iter()
                .any(|candidate| field_value.matches(candidate)),
        })
    }
}
