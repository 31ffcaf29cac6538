//! Filter and update language
//!
//! Filters are plain data: they can be compared, logged and compiled either
//! into SQL (see [`super::postgres`]) or into an in-process [`Matcher`].
//!
//! Matching rules follow document-store conventions:
//!
//! - `Eq` against an array field matches when any element is equal
//! - `Eq` against `null` also matches a missing field
//! - `Ne` is the exact negation of `Eq`, so it matches missing fields
//! - `Lt` compares RFC 3339 strings as instants, numbers numerically and
//!   other strings lexically; mismatched types never match
//! - `In` matches when `Eq` would match any of the listed values

use chrono::{DateTime, Utc};
use regex_lite::{Regex, RegexBuilder};
use serde_json::Value;
use std::cmp::Ordering;

use super::{Document, StoreError, StoreResult};

/// Query predicate over documents
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document
    All,

    Eq { field: String, value: Value },

    Ne { field: String, value: Value },

    Lt { field: String, value: Value },

    In { field: String, values: Vec<Value> },

    Regex {
        field: String,
        pattern: String,
        case_insensitive: bool,
    },

    And(Vec<Filter>),

    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in(field: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Filter::In {
            field: field.into(),
            values: values.into_iter().collect(),
        }
    }

    /// Case-insensitive regular expression match on a string field
    pub fn regex_ci(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Regex {
            field: field.into(),
            pattern: pattern.into(),
            case_insensitive: true,
        }
    }

    pub fn any_of(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    /// Conjunction of `self` and `other`
    ///
    /// `All` is the identity and nested conjunctions are flattened, so the
    /// result for identical inputs is always structurally identical.
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// Compiles the filter for in-process evaluation
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidQuery` if a regular expression is invalid.
    pub fn compile(&self) -> StoreResult<Matcher> {
        Ok(Matcher {
            node: Node::compile(self)?,
        })
    }
}

/// Compiled form of a [`Filter`]
#[derive(Debug)]
pub struct Matcher {
    node: Node,
}

impl Matcher {
    pub fn matches(&self, doc: &Document) -> bool {
        self.node.matches(doc)
    }
}

#[derive(Debug)]
enum Node {
    All,
    Eq(Vec<String>, Value),
    Ne(Vec<String>, Value),
    Lt(Vec<String>, Value),
    In(Vec<String>, Vec<Value>),
    Regex(Vec<String>, Regex),
    And(Vec<Node>),
    Or(Vec<Node>),
}

impl Node {
    fn compile(filter: &Filter) -> StoreResult<Node> {
        Ok(match filter {
            Filter::All => Node::All,
            Filter::Eq { field, value } => Node::Eq(split_path(field), value.clone()),
            Filter::Ne { field, value } => Node::Ne(split_path(field), value.clone()),
            Filter::Lt { field, value } => Node::Lt(split_path(field), value.clone()),
            Filter::In { field, values } => Node::In(split_path(field), values.clone()),
            Filter::Regex {
                field,
                pattern,
                case_insensitive,
            } => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(*case_insensitive)
                    .build()
                    .map_err(|e| StoreError::InvalidQuery(format!("bad pattern {pattern:?}: {e}")))?;
                Node::Regex(split_path(field), regex)
            }
            Filter::And(filters) => {
                Node::And(filters.iter().map(Node::compile).collect::<StoreResult<_>>()?)
            }
            Filter::Or(filters) => {
                Node::Or(filters.iter().map(Node::compile).collect::<StoreResult<_>>()?)
            }
        })
    }

    fn matches(&self, doc: &Document) -> bool {
        match self {
            Node::All => true,
            Node::Eq(path, value) => field_matches(lookup(doc, path), value),
            Node::Ne(path, value) => !field_matches(lookup(doc, path), value),
            Node::Lt(path, value) => lookup(doc, path)
                .and_then(|actual| compare_values(actual, value))
                .is_some_and(|ord| ord == Ordering::Less),
            Node::In(path, values) => {
                let actual = lookup(doc, path);
                values.iter().any(|value| field_matches(actual, value))
            }
            Node::Regex(path, regex) => lookup(doc, path)
                .and_then(Value::as_str)
                .is_some_and(|s| regex.is_match(s)),
            Node::And(nodes) => nodes.iter().all(|n| n.matches(doc)),
            Node::Or(nodes) => nodes.iter().any(|n| n.matches(doc)),
        }
    }
}

/// Splits a dotted field path into its segments
pub fn split_path(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

/// Resolves a field path inside a document
pub fn lookup<'a>(doc: &'a Document, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = doc.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// JSON equality that treats `1` and `1.0` as equal
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Equality-match semantics for a possibly missing or array-valued field
pub fn field_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None | Some(Value::Null) => expected.is_null(),
        Some(array @ Value::Array(items)) => {
            values_equal(array, expected) || items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
    }
}

/// Ordering between two stored values, if they are comparable
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_instant(x), parse_instant(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            (None, None) => Some(x.cmp(y)),
            _ => None,
        },
        _ => None,
    }
}

/// Parses an RFC 3339 timestamp
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Field assignments applied by `update_one`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Document,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `value` to `field`
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn fields(&self) -> &Document {
        &self.set
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Applies the assignments, returning whether the document changed
    pub fn apply(&self, doc: &mut Document) -> bool {
        let mut changed = false;
        for (field, value) in &self.set {
            if doc.get(field) != Some(value) {
                doc.insert(field.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }
}
