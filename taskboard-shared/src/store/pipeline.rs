//! Aggregation pipelines
//!
//! A pipeline is an ordered list of [`Stage`]s evaluated over one
//! collection. A leading `Match` is pushed down into the backend's `find`;
//! the remaining stages run in-process over the matched documents.

use serde_json::Value;

use super::filter::{field_matches, lookup, split_path, Filter};
use super::identifier::resolve_candidates;
use super::{Collection, Cursor, Document, DocumentStore, StoreResult};

/// Source of a computed field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Copy of another field, by dotted path
    Path(String),

    /// Constant value
    Literal(Value),
}

/// One pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keeps documents matching the filter
    Match(Filter),

    /// Left outer join against another collection
    ///
    /// Each document gains an array field `as_field` holding every document
    /// of `from` whose `foreign_field` equals `local_field`. An array-valued
    /// local field joins on each element. A string key also joins on its
    /// object id form when it decodes as one. A missing local field joins
    /// nothing, so the result is an empty array rather than an absent field.
    Lookup {
        from: Collection,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },

    /// Adds or overwrites fields; a path that resolves to nothing adds nothing
    AddFields(Vec<(String, FieldValue)>),
}

impl Stage {
    pub fn lookup(
        from: Collection,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Self {
        Stage::Lookup {
            from,
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
        }
    }

    /// Single-field `AddFields` copying `path` into `name`
    pub fn copy_field(name: impl Into<String>, path: impl Into<String>) -> Self {
        Stage::AddFields(vec![(name.into(), FieldValue::Path(path.into()))])
    }
}

/// Evaluates `stages` over `collection`
///
/// # Errors
///
/// Propagates store errors from the underlying reads and
/// `StoreError::InvalidQuery` for filters that fail to compile.
pub async fn execute<S>(store: &S, collection: Collection, stages: &[Stage]) -> StoreResult<Cursor>
where
    S: DocumentStore + ?Sized,
{
    let (initial, rest) = match stages.split_first() {
        Some((Stage::Match(filter), rest)) => (filter.clone(), rest),
        _ => (Filter::All, stages),
    };

    let mut docs: Vec<Document> = store.find(collection, &initial).await?.collect();

    for stage in rest {
        match stage {
            Stage::Match(filter) => {
                let matcher = filter.compile()?;
                docs.retain(|doc| matcher.matches(doc));
            }
            Stage::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => {
                let local_path = split_path(local_field);
                let foreign_path = split_path(foreign_field);

                let keys = join_keys(&docs, &local_path);
                let foreign: Vec<Document> = if keys.is_empty() {
                    Vec::new()
                } else {
                    store
                        .find(*from, &Filter::is_in(foreign_field.clone(), keys))
                        .await?
                        .collect()
                };

                for doc in &mut docs {
                    let local = lookup(doc, &local_path).cloned();
                    let joined = foreign
                        .iter()
                        .filter(|f| joins(local.as_ref(), lookup(f, &foreign_path)))
                        .map(|f| Value::Object(f.clone()))
                        .collect();
                    doc.insert(as_field.clone(), Value::Array(joined));
                }
            }
            Stage::AddFields(fields) => {
                for doc in &mut docs {
                    for (name, source) in fields {
                        let value = match source {
                            FieldValue::Path(path) => lookup(doc, &split_path(path)).cloned(),
                            FieldValue::Literal(value) => Some(value.clone()),
                        };
                        if let Some(value) = value {
                            doc.insert(name.clone(), value);
                        }
                    }
                }
            }
        }
    }

    Ok(Cursor::new(docs))
}

/// Distinct local values referenced by `docs`, arrays flattened
fn join_keys(docs: &[Document], local_path: &[String]) -> Vec<Value> {
    let mut keys: Vec<Value> = Vec::new();
    let mut push = |value: &Value| {
        for form in key_forms(value) {
            if !form.is_null() && !keys.contains(&form) {
                keys.push(form);
            }
        }
    };

    for doc in docs {
        match lookup(doc, local_path) {
            Some(Value::Array(items)) => items.iter().for_each(&mut push),
            Some(value) => push(value),
            None => {}
        }
    }
    keys
}

/// Stored forms a join key may take: verbatim, then object id if it decodes
fn key_forms(value: &Value) -> Vec<Value> {
    match value {
        Value::String(raw) => resolve_candidates(raw)
            .into_iter()
            .map(|candidate| candidate.id.to_value())
            .collect(),
        other => vec![other.clone()],
    }
}

fn joins(local: Option<&Value>, foreign: Option<&Value>) -> bool {
    let key_matches = |key: &Value| key_forms(key).iter().any(|form| field_matches(foreign, form));
    match local {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => items.iter().any(key_matches),
        Some(value) => key_matches(value),
    }
}
