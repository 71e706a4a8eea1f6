//! Query translation from recordlayer filters to MongoDB query syntax.
//!
//! This module translates the abstract filter expressions compiled by the adapter
//! into MongoDB BSON documents, and the rest of a [`Query`] into find options.

use bson::{Bson, Document, doc};
use mongodb::options::FindOptions;

use recordlayer_core::{
    error::{AdapterError, AdapterResult},
    query::{Expr, FieldOp, Projection, Query, QueryVisitor, SortDirection},
};

/// Translates recordlayer filter expressions into MongoDB query documents.
///
/// This struct implements the [`QueryVisitor`] trait to convert abstract
/// query expressions into MongoDB's native BSON query syntax.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter; `None` selects every document.
    pub(crate) fn filter(filter: Option<&Expr>) -> AdapterResult<Document> {
        match filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(Document::new()),
        }
    }

    /// Builds the find options carrying projection, sort, skip and limit.
    pub(crate) fn find_options(query: &Query) -> AdapterResult<FindOptions> {
        let mut options = FindOptions::default();

        options.projection = query.projection.as_ref().map(|projection| match projection {
            // `_id` is returned unless excluded, which inclusion never does.
            Projection::Include(fields) => fields.iter().map(|field| (field.clone(), Bson::Int32(1))).collect(),
            Projection::Exclude(fields) => fields.iter().map(|field| (field.clone(), Bson::Int32(0))).collect(),
        });

        if !query.sort.is_empty() {
            options.sort = Some(
                query
                    .sort
                    .iter()
                    .map(|sort| {
                        let direction = match sort.direction {
                            SortDirection::Asc => 1,
                            SortDirection::Desc => -1,
                        };
                        (sort.field.clone(), Bson::Int32(direction))
                    })
                    .collect(),
            );
        }

        options.skip = query.offset;
        options.limit = match query.limit {
            // The server reads a zero limit as no limit at all.
            Some(0) => return Err(AdapterError::InvalidQuery("limit must be positive".to_string())),
            limit => limit
                .map(i64::try_from)
                .transpose()
                .map_err(|_| AdapterError::InvalidQuery("limit is out of range".to_string()))?,
        };

        Ok(options)
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = AdapterError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(Document::new());
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    // `$not` only applies to field conditions, `$nor` negates a whole expression.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_length(&mut self, field: &str, min: Option<u64>, max: Option<u64>) -> Result<Self::Output, Self::Error> {
        let mut bounds = Vec::new();

        // A sequence has at least `n` elements when index `n - 1` exists.
        if let Some(min) = min.filter(|min| *min > 0) {
            bounds.push(doc! { format!("{field}.{}", min - 1): { "$exists": true } });
        }
        if let Some(max) = max {
            bounds.push(doc! { format!("{field}.{max}"): { "$exists": false } });
        }

        Ok(match bounds.len() {
            0 => Document::new(),
            1 => bounds.remove(0),
            _ => doc! { "$and": bounds },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let membership = |operator: &str| match value {
            Bson::Array(values) => Ok(doc! { operator: values }),
            _ => Err(AdapterError::Storage(format!(
                "membership test on `{field}` requires a sequence of values"
            ))),
        };

        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::AnyOf => membership("$in")?,
                FieldOp::NoneOf => membership("$nin")?,
            }
        })
    }
}
