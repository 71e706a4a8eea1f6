//! Query options and their compilation into store-facing queries.
//!
//! Callers describe what they want with [`QueryOptions`] (match, range and existence
//! conditions, projection, sort, offset and limit). The [`QueryCompiler`] turns those
//! options into a [`Query`] whose filter is an [`Expr`] tree. Backends never see
//! `QueryOptions`; each one translates `Expr` with its own [`QueryVisitor`].
//!
//! # Example
//!
//! ```ignore
//! use recordlayer::query::{QueryOptions, SortDirection};
//!
//! let options = QueryOptions::new()
//!     .matching("language", "es")
//!     .range("amount", Some(1), None)
//!     .exists("article", true)
//!     .sort("name", SortDirection::Asc)
//!     .limit(10);
//! ```

use std::{collections::BTreeMap, fmt, sync::Arc};
use bson::Bson;

use crate::{
    error::{AdapterError, AdapterResult},
    record::{NATIVE_ID_FIELD, RecordMapper},
    schema::RecordType,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key. Queries sort by their keys in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Field (or any element of a sequence field) equals one of the values.
    AnyOf,
    /// Field (and every element of a sequence field) equals none of the values.
    NoneOf,
}

/// A filter expression over stored documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All expressions must match. An empty list matches every document.
    And(Vec<Expr>),
    /// Any expression must match.
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// The field is present (`true`) or absent (`false`).
    Exists(String, bool),
    /// The sequence field's length lies within the inclusive bounds.
    /// A missing field has length zero.
    Length {
        field: String,
        min: Option<u64>,
        max: Option<u64>,
    },
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// Helper for constructing filter expressions, mostly useful in query overrides.
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn length(field: impl Into<String>, min: Option<u64>, max: Option<u64>) -> Expr {
        Expr::Length { field: field.into(), min, max }
    }

    pub fn any_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::AnyOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn none_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::NoneOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

/// Field projection applied to read results.
///
/// Stores cannot mix inclusion and exclusion, so a projection is one or the other.
/// The identifier is always returned in inclusion mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

/// A compiled, store-facing query.
///
/// All field names are already in their stored form (`_id` for the identifier).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Expr>,
    pub projection: Option<Projection>,
    pub sort: Vec<Sort>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

/// Value side of a match condition.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchValue {
    /// The field equals the value (or, for sequence fields, contains it).
    One(Bson),
    /// The field equals any of the values (or, for sequence fields, contains any).
    AnyOf(Vec<Bson>),
}

impl From<Bson> for MatchValue {
    fn from(value: Bson) -> Self {
        match value {
            Bson::Array(values) => MatchValue::AnyOf(values),
            value => MatchValue::One(value),
        }
    }
}

/// Inclusive bounds of a range condition. Either bound may be absent.
///
/// On sequence fields the bounds apply to the sequence length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Range {
    pub min: Option<Bson>,
    pub max: Option<Bson>,
}

/// Function that may replace the compiled filter.
///
/// It receives the filter compiled from match, range and exists conditions (or
/// `None` when there are none). Returning `Some` replaces the filter entirely.
pub type QueryOverride = Arc<dyn Fn(Option<&Expr>) -> Option<Expr> + Send + Sync>;

/// Caller-facing description of a read.
#[derive(Clone, Default)]
pub struct QueryOptions {
    pub matches: BTreeMap<String, MatchValue>,
    pub ranges: BTreeMap<String, Range>,
    pub exists: BTreeMap<String, bool>,
    /// Field name to `true` (include) or `false` (exclude).
    pub fields: BTreeMap<String, bool>,
    pub sort: Vec<Sort>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub query: Option<QueryOverride>,
}

impl fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("matches", &self.matches)
            .field("ranges", &self.ranges)
            .field("exists", &self.exists)
            .field("fields", &self.fields)
            .field("sort", &self.sort)
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("query", &self.query.as_ref().map(|_| "<override>"))
            .finish()
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a match condition. A sequence value is a membership test.
    pub fn matching(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.matches.insert(field.into(), MatchValue::from(value.into()));
        self
    }

    /// Adds a membership match condition.
    pub fn matching_any<V: Into<Bson>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.matches.insert(
            field.into(),
            MatchValue::AnyOf(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    pub fn range<V: Into<Bson>>(mut self, field: impl Into<String>, min: Option<V>, max: Option<V>) -> Self {
        self.ranges.insert(
            field.into(),
            Range { min: min.map(Into::into), max: max.map(Into::into) },
        );
        self
    }

    pub fn exists(mut self, field: impl Into<String>, exists: bool) -> Self {
        self.exists.insert(field.into(), exists);
        self
    }

    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), true);
        self
    }

    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), false);
        self
    }

    /// Appends a sort key. Earlier keys take priority.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(Sort { field: field.into(), direction });
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets a function that may replace the compiled filter.
    pub fn query<F>(mut self, query: F) -> Self
    where
        F: Fn(Option<&Expr>) -> Option<Expr> + Send + Sync + 'static,
    {
        self.query = Some(Arc::new(query));
        self
    }
}

/// Translates [`QueryOptions`] into a store-facing [`Query`].
pub struct QueryCompiler;

impl QueryCompiler {
    /// Compiles the options and explicit identifiers for `record_type`.
    ///
    /// Returns `Ok(None)` when the query selects nothing by construction (an empty
    /// identifier list), so the caller can answer without touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidQuery`] for a mixed projection or a
    /// non-integer range bound on a sequence field.
    pub fn compile(
        record_type: &RecordType,
        ids: Option<&[Bson]>,
        options: Option<&QueryOptions>,
    ) -> AdapterResult<Option<Query>> {
        if ids.is_some_and(<[Bson]>::is_empty) {
            return Ok(None);
        }

        let default = QueryOptions::default();
        let options = options.unwrap_or(&default);

        let mut filter = Self::compile_filter(record_type, options)?;

        if let Some(query) = &options.query {
            if let Some(replacement) = query(filter.as_ref()) {
                filter = Some(replacement);
            }
        }

        if let Some(ids) = ids {
            let by_id = Filter::any_of(NATIVE_ID_FIELD, ids.iter().cloned());
            filter = Some(match filter {
                Some(filter) => filter.and(by_id),
                None => by_id,
            });
        }

        Ok(Some(Query {
            filter,
            projection: Self::compile_projection(&options.fields)?,
            sort: options
                .sort
                .iter()
                .map(|sort| Sort {
                    field: RecordMapper::native_field(&sort.field).to_string(),
                    direction: sort.direction,
                })
                .collect(),
            offset: options.offset,
            limit: options.limit,
        }))
    }

    /// Compiles the match, range and exists conditions into a single filter.
    pub fn compile_filter(record_type: &RecordType, options: &QueryOptions) -> AdapterResult<Option<Expr>> {
        let mut clauses = Vec::new();

        for (field, value) in &options.matches {
            let is_array = record_type.is_array(field);
            let field = RecordMapper::native_field(field).to_string();

            clauses.push(match value {
                MatchValue::One(value) if is_array => {
                    Expr::field(field, FieldOp::AnyOf, Bson::Array(vec![value.clone()]))
                }
                MatchValue::One(value) => Expr::field(field, FieldOp::Eq, value.clone()),
                MatchValue::AnyOf(values) => {
                    Expr::field(field, FieldOp::AnyOf, Bson::Array(values.clone()))
                }
            });
        }

        for (name, range) in &options.ranges {
            let field = RecordMapper::native_field(name).to_string();

            if record_type.is_array(name) {
                clauses.push(Expr::Length {
                    field,
                    min: range.min.as_ref().map(|min| length_bound(name, min)).transpose()?,
                    max: range.max.as_ref().map(|max| length_bound(name, max)).transpose()?,
                });
                continue;
            }

            if let Some(min) = &range.min {
                clauses.push(Expr::field(field.clone(), FieldOp::Gte, min.clone()));
            }
            if let Some(max) = &range.max {
                clauses.push(Expr::field(field, FieldOp::Lte, max.clone()));
            }
        }

        for (name, exists) in &options.exists {
            let field = RecordMapper::native_field(name).to_string();

            // An empty sequence counts as absent.
            clauses.push(match (record_type.is_array(name), exists) {
                (true, true) => Expr::Length { field, min: Some(1), max: None },
                (true, false) => Expr::Length { field, min: None, max: Some(0) },
                (false, exists) => Expr::Exists(field, *exists),
            });
        }

        Ok(match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Expr::And(clauses)),
        })
    }

    fn compile_projection(fields: &BTreeMap<String, bool>) -> AdapterResult<Option<Projection>> {
        if fields.is_empty() {
            return Ok(None);
        }

        let names = fields
            .keys()
            .map(|field| RecordMapper::native_field(field).to_string())
            .collect::<Vec<_>>();

        if fields.values().all(|include| *include) {
            Ok(Some(Projection::Include(names)))
        } else if fields.values().all(|include| !*include) {
            Ok(Some(Projection::Exclude(names)))
        } else {
            Err(AdapterError::InvalidQuery(
                "field projection cannot mix inclusion and exclusion".to_string(),
            ))
        }
    }
}

fn length_bound(field: &str, value: &Bson) -> AdapterResult<u64> {
    let length = match value {
        Bson::Int32(n) => u64::try_from(*n).ok(),
        Bson::Int64(n) => u64::try_from(*n).ok(),
        Bson::Double(n) if n.fract() == 0.0 && *n >= 0.0 => Some(*n as u64),
        _ => None,
    };

    length.ok_or_else(|| {
        AdapterError::InvalidQuery(format!(
            "range on sequence field `{field}` needs non-negative integer bounds"
        ))
    })
}

/// Walks a filter expression, producing a backend-specific output.
pub trait QueryVisitor {
    type Output;
    type Error: Into<AdapterError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_length(
        &mut self,
        field: &str,
        min: Option<u64>,
        max: Option<u64>,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Length { field, min, max } => self.visit_length(field, *min, *max),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
