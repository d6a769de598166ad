// Where-clause translation into a backend-native filter tree.
//
// The output shape follows ORM filter objects: a single clause becomes
// `{ field: { op: value } }`; several clauses become `{ AND: [...], OR: [...] }`
// with empty groups omitted. The same tree can be evaluated in-process
// (`NativeFilter::matches`) or rendered to SQL by the sqlx crate.

use std::cmp::Ordering;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::db::adapter::{Operator, WhereClause};
use crate::error::{FeatureError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    /// SQL `LIKE` pattern with `%` and `_` wildcards.
    Like,
}

impl NativeOp {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Like => "like",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NativeFilter {
    Condition {
        field: String,
        op: NativeOp,
        value: Value,
    },
    /// Every `and` member holds, and at least one `or` member holds when
    /// `or` is non-empty.
    Group {
        and: Vec<NativeFilter>,
        or: Vec<NativeFilter>,
    },
}

impl Serialize for NativeFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            NativeFilter::Condition { field, op, value } => {
                let mut inner = Map::new();
                inner.insert(op.key().to_string(), value.clone());
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(field, &inner)?;
                map.end()
            }
            NativeFilter::Group { and, or } => {
                let len = usize::from(!and.is_empty()) + usize::from(!or.is_empty());
                let mut map = serializer.serialize_map(Some(len))?;
                if !and.is_empty() {
                    map.serialize_entry("AND", and)?;
                }
                if !or.is_empty() {
                    map.serialize_entry("OR", or)?;
                }
                map.end()
            }
        }
    }
}

/// Translate with field names used as-is.
pub fn translate_where(clauses: &[WhereClause]) -> Result<Option<NativeFilter>> {
    translate_where_with(clauses, |f| f.to_string())
}

/// Translate a where list, mapping each logical field through `field_name`.
///
/// Returns `Ok(None)` for an empty list (match all rows).
pub fn translate_where_with<F>(clauses: &[WhereClause], field_name: F) -> Result<Option<NativeFilter>>
where
    F: Fn(&str) -> String,
{
    match clauses {
        [] => Ok(None),
        [single] => translate_clause(single, &field_name).map(Some),
        _ => {
            let mut and = Vec::new();
            let mut or = Vec::new();
            for clause in clauses {
                let native = translate_clause(clause, &field_name)?;
                if clause.is_or() {
                    or.push(native);
                } else {
                    and.push(native);
                }
            }
            Ok(Some(NativeFilter::Group { and, or }))
        }
    }
}

fn translate_clause<F>(clause: &WhereClause, field_name: &F) -> Result<NativeFilter>
where
    F: Fn(&str) -> String,
{
    let field = field_name(&clause.field);
    let value = clause.value.clone();
    let (op, value) = match &clause.operator {
        Operator::Eq => (NativeOp::Eq, value),
        Operator::Ne => (NativeOp::Ne, value),
        Operator::Gt => (NativeOp::Gt, value),
        Operator::Gte => (NativeOp::Gte, value),
        Operator::Lt => (NativeOp::Lt, value),
        Operator::Lte => (NativeOp::Lte, value),
        Operator::In | Operator::NotIn => {
            if !value.is_array() {
                return Err(FeatureError::Validation(format!(
                    "{} operator requires an array value (field \"{}\")",
                    clause.operator, clause.field
                )));
            }
            let op = if clause.operator == Operator::In {
                NativeOp::In
            } else {
                NativeOp::NotIn
            };
            (op, value)
        }
        Operator::Contains => (NativeOp::Like, like_pattern("%", &value, "%")),
        Operator::StartsWith => (NativeOp::Like, like_pattern("", &value, "%")),
        Operator::EndsWith => (NativeOp::Like, like_pattern("%", &value, "")),
        Operator::Other(name) => {
            tracing::warn!("Unsupported operator: {}. Defaulting to equality.", name);
            (NativeOp::Eq, value)
        }
    };
    Ok(NativeFilter::Condition { field, op, value })
}

fn like_pattern(prefix: &str, value: &Value, suffix: &str) -> Value {
    Value::String(format!("{}{}{}", prefix, value_to_string(value), suffix))
}

/// String form of a scalar JSON value (strings unquoted).
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ─── In-process evaluation ───────────────────────────────────────

impl NativeFilter {
    /// Evaluate against a record. Missing fields compare as `null`.
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            NativeFilter::Condition { field, op, value } => {
                let actual = record.get(field).unwrap_or(&Value::Null);
                condition_holds(actual, *op, value)
            }
            NativeFilter::Group { and, or } => {
                and.iter().all(|f| f.matches(record))
                    && (or.is_empty() || or.iter().any(|f| f.matches(record)))
            }
        }
    }
}

/// `None` filter matches everything.
pub fn matches(filter: Option<&NativeFilter>, record: &Value) -> bool {
    filter.map_or(true, |f| f.matches(record))
}

fn condition_holds(actual: &Value, op: NativeOp, expected: &Value) -> bool {
    match op {
        NativeOp::Eq => values_equal(actual, expected),
        NativeOp::Ne => !values_equal(actual, expected),
        NativeOp::Gt => compare_values(actual, expected) == Some(Ordering::Greater),
        NativeOp::Gte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        NativeOp::Lt => compare_values(actual, expected) == Some(Ordering::Less),
        NativeOp::Lte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        NativeOp::In => expected
            .as_array()
            .is_some_and(|list| list.iter().any(|v| values_equal(actual, v))),
        NativeOp::NotIn => expected
            .as_array()
            .is_some_and(|list| !list.iter().any(|v| values_equal(actual, v))),
        NativeOp::Like => match (actual, expected.as_str()) {
            (Value::Null, _) | (_, None) => false,
            (actual, Some(pattern)) => like_match(&value_to_string(actual), pattern),
        },
    }
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between two JSON scalars of the same kind.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// SQL `LIKE` semantics: `%` any run, `_` one character. Case-sensitive.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    // Last `%` seen and the text position it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '_' || c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, absorbed)) => {
                    p = star + 1;
                    t = absorbed + 1;
                    backtrack = Some((star, t));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}
