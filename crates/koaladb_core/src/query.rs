//! Predicate matching and ordering over documents.
//!
//! A [`Filter`] is a conjunction of `(field, Condition)` clauses. Every
//! clause requires its field to be present, except `Exists(false)`.
//!
//! ```
//! use koaladb_core::query::Filter;
//!
//! let adults_in_paris = Filter::new().eq("city", "Paris").gte("age", 18);
//! assert_eq!(adults_in_paris.len(), 2);
//! ```

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use koaladb_codec::Value;
use std::cmp::Ordering;

/// A single comparison against one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value.
    Eq(Value),
    /// Field is present and differs from the value.
    Ne(Value),
    /// Field is greater than the value.
    Gt(Value),
    /// Field is greater than or equal to the value.
    Gte(Value),
    /// Field is less than the value.
    Lt(Value),
    /// Field is less than or equal to the value.
    Lte(Value),
    /// Field equals one of the values.
    In(Vec<Value>),
    /// Field is present and equals none of the values.
    Nin(Vec<Value>),
    /// Field presence.
    Exists(bool),
}

impl Condition {
    /// Evaluates the condition against a field value, `None` if absent.
    #[must_use]
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let value = match (self, value) {
            (Self::Exists(expected), value) => return value.is_some() == *expected,
            (_, None) => return false,
            (_, Some(value)) => value,
        };
        match self {
            Self::Eq(target) => values_equal(value, target),
            Self::Ne(target) => !values_equal(value, target),
            Self::Gt(target) => compare_values(value, target) == Some(Ordering::Greater),
            Self::Gte(target) => matches!(
                compare_values(value, target),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lt(target) => compare_values(value, target) == Some(Ordering::Less),
            Self::Lte(target) => matches!(
                compare_values(value, target),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::In(targets) => targets.iter().any(|t| values_equal(value, t)),
            Self::Nin(targets) => !targets.iter().any(|t| values_equal(value, t)),
            Self::Exists(_) => true,
        }
    }

    fn from_operator(op: &str, operand: &Value) -> CoreResult<Self> {
        let list = || {
            operand.as_array().map(<[Value]>::to_vec).ok_or_else(|| {
                CoreError::validation(format!(
                    "operator {op} expects an array, got {}",
                    operand.type_name()
                ))
            })
        };
        Ok(match op {
            "$eq" => Self::Eq(operand.clone()),
            "$ne" => Self::Ne(operand.clone()),
            "$gt" => Self::Gt(operand.clone()),
            "$gte" => Self::Gte(operand.clone()),
            "$lt" => Self::Lt(operand.clone()),
            "$lte" => Self::Lte(operand.clone()),
            "$in" => Self::In(list()?),
            "$nin" => Self::Nin(list()?),
            "$exists" => Self::Exists(operand.as_bool().ok_or_else(|| {
                CoreError::validation("operator $exists expects a boolean")
            })?),
            other => {
                return Err(CoreError::validation(format!(
                    "unknown query operator {other}"
                )))
            }
        })
    }
}

/// A conjunction of field conditions. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an arbitrary clause.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push((field.into(), condition));
        self
    }

    /// Adds `field == value`.
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    /// Adds `field != value`.
    #[must_use]
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Ne(value.into()))
    }

    /// Adds `field > value`.
    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Gt(value.into()))
    }

    /// Adds `field >= value`.
    #[must_use]
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Gte(value.into()))
    }

    /// Adds `field < value`.
    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Lt(value.into()))
    }

    /// Adds `field <= value`.
    #[must_use]
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Lte(value.into()))
    }

    /// Adds `field` in `values`.
    #[must_use]
    pub fn is_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.with(field, Condition::In(values.into_iter().map(Into::into).collect()))
    }

    /// Adds `field` not in `values`.
    #[must_use]
    pub fn not_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.with(field, Condition::Nin(values.into_iter().map(Into::into).collect()))
    }

    /// Adds a presence check.
    #[must_use]
    pub fn exists(self, field: impl Into<String>, present: bool) -> Self {
        self.with(field, Condition::Exists(present))
    }

    /// Builds a filter from a map value.
    ///
    /// Each entry is either `field: value` (equality) or
    /// `field: {"$op": operand, ...}` where every key of the inner map starts
    /// with `$`. Supported operators: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`,
    /// `$lte`, `$in`, `$nin`, `$exists`. An inner map without `$` keys is
    /// compared for equality.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `value` is not a map with text keys, an
    /// operator is unknown, or an operand has the wrong type.
    pub fn from_value(value: &Value) -> CoreResult<Self> {
        let pairs = value.as_map().ok_or_else(|| {
            CoreError::validation(format!("filter must be a map, got {}", value.type_name()))
        })?;

        let mut filter = Self::new();
        for (key, expected) in pairs {
            let field = key
                .as_text()
                .filter(|name| !name.is_empty())
                .ok_or_else(|| CoreError::validation("filter field must be non-empty text"))?;

            match operator_map(expected) {
                Some(ops) => {
                    for (op, operand) in ops {
                        filter = filter.with(field, Condition::from_operator(op, operand)?);
                    }
                }
                None => filter = filter.eq(field, expected.clone()),
            }
        }
        Ok(filter)
    }

    /// Returns true if every clause holds for `doc`.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, condition)| condition.matches(doc.get(field)))
    }

    /// The clauses in order.
    #[must_use]
    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    /// Number of clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Returns true if the filter has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Returns the `(operator, operand)` pairs if every key of a map starts with `$`.
fn operator_map(value: &Value) -> Option<Vec<(&str, &Value)>> {
    let pairs = value.as_map().filter(|pairs| !pairs.is_empty())?;
    pairs
        .iter()
        .map(|(k, v)| k.as_text().filter(|op| op.starts_with('$')).map(|op| (op, v)))
        .collect()
}

/// Direction for [`sort_documents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Equality with numeric widening: `Integer(30)` equals `Float(30.0)`.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Map(xs), Value::Map(ys)) => {
            xs.len() == ys.len()
                && xs.iter().all(|(k, v)| {
                    ys.iter()
                        .any(|(k2, v2)| values_equal(k, k2) && values_equal(v, v2))
                })
        }
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// Orders two values of comparable types.
///
/// Numbers compare numerically across `Integer`/`Float`; text, bytes and
/// booleans compare naturally. Any other pairing is incomparable.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        if let (Value::Integer(i), Value::Integer(j)) = (a, b) {
            return Some(i.cmp(j));
        }
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Integer(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
        Value::Bytes(_) => 4,
        Value::Array(_) => 5,
        Value::Map(_) => 6,
    }
}

/// Total order used for sorting: by type rank, then by value.
fn sort_key_cmp(a: &Value, b: &Value) -> Ordering {
    type_rank(a)
        .cmp(&type_rank(b))
        .then_with(|| compare_values(a, b).unwrap_or_else(|| a.cmp_canonical(b)))
}

/// Sorts documents by `field`. Documents lacking the field go last in
/// either direction; ties keep their relative order.
pub fn sort_documents<T>(
    items: &mut [T],
    field: &str,
    order: SortOrder,
    doc: impl Fn(&T) -> &Document,
) {
    items.sort_by(|x, y| match (doc(x).get(field), doc(y).get(field)) {
        (Some(a), Some(b)) => match order {
            SortOrder::Ascending => sort_key_cmp(a, b),
            SortOrder::Descending => sort_key_cmp(b, a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
