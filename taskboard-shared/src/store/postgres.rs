//! PostgreSQL JSONB backend
//!
//! All collections share the `documents` table created by the embedded
//! migrations. Filters are compiled to SQL over the `body` column; the
//! primary key is mirrored into the indexed `id` column.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::debug;

use super::filter::{parse_instant, split_path, Filter, Update};
use super::identifier::DocumentId;
use super::memory::assign_id;
use super::{
    Collection, Cursor, Document, DocumentStore, StoreError, StoreResult, UpdateOutcome, ID_FIELD,
};
use crate::db::pool::health_check;

const UNIQUE_VIOLATION: &str = "23505";
const INVALID_REGEX: &str = "2201B";

/// Document store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Wraps a pool whose schema is already migrated
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn select<'a>(collection: Collection, columns: &str, filter: &Filter) -> QueryBuilder<'a, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT {columns} FROM documents WHERE collection = "));
        qb.push_bind(collection.as_str());
        qb.push(" AND ");
        push_filter(&mut qb, filter);
        qb
    }
}

/// Maps a driver error, attributing unique violations to `collection`
fn map_sqlx(collection: Collection) -> impl Fn(sqlx::Error) -> StoreError {
    move |err| {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return StoreError::DuplicateKey {
                    collection,
                    key: db.constraint().unwrap_or("unknown").to_string(),
                };
            }
        }
        StoreError::from(err)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let message = err.to_string();
        match err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(INVALID_REGEX) => {
                StoreError::InvalidQuery(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(message)
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => StoreError::Decode(message),
            _ => StoreError::Backend(message),
        }
    }
}

fn body_of(row: &PgRow) -> StoreResult<Document> {
    let Json(value): Json<Value> = row.try_get("body")?;
    match value {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::Decode(format!(
            "expected object body, found {other}"
        ))),
    }
}

/// Appends the SQL form of `filter` as a parenthesized boolean expression
pub(crate) fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::All => {
            qb.push("TRUE");
        }
        Filter::Eq { field, value } => push_eq(qb, field, value),
        Filter::Ne { field, value } => {
            qb.push("NOT COALESCE(");
            push_eq(qb, field, value);
            qb.push(", FALSE)");
        }
        Filter::Lt { field, value } => push_lt(qb, field, value),
        Filter::In { field, values } => {
            if values.is_empty() {
                qb.push("FALSE");
            } else {
                push_joined(qb, " OR ", values, |qb, value| push_eq(qb, field, value));
            }
        }
        Filter::Regex {
            field,
            pattern,
            case_insensitive,
        } => {
            let op = if *case_insensitive { "~*" } else { "~" };
            qb.push("COALESCE((jsonb_typeof(body #> ");
            qb.push_bind(split_path(field));
            qb.push(") = 'string' AND (body #>> ");
            qb.push_bind(split_path(field));
            qb.push(format!(") {op} "));
            qb.push_bind(pattern.clone());
            qb.push("), FALSE)");
        }
        Filter::And(filters) => {
            if filters.is_empty() {
                qb.push("TRUE");
            } else {
                push_joined(qb, " AND ", filters, push_filter);
            }
        }
        Filter::Or(filters) => {
            if filters.is_empty() {
                qb.push("FALSE");
            } else {
                push_joined(qb, " OR ", filters, push_filter);
            }
        }
    }
}

fn push_joined<T>(
    qb: &mut QueryBuilder<'_, Postgres>,
    separator: &str,
    items: &[T],
    mut push: impl FnMut(&mut QueryBuilder<'_, Postgres>, &T),
) {
    qb.push("(");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            qb.push(separator);
        }
        push(qb, item);
    }
    qb.push(")");
}

fn push_eq(qb: &mut QueryBuilder<'_, Postgres>, field: &str, value: &Value) {
    if field == ID_FIELD {
        qb.push("(id = ");
        qb.push_bind(Json(value.clone()));
        qb.push(")");
        return;
    }

    let path = split_path(field);
    if value.is_null() {
        qb.push("(body #> ");
        qb.push_bind(path.clone());
        qb.push(" IS NULL OR body #> ");
        qb.push_bind(path);
        qb.push(" = 'null'::jsonb)");
        return;
    }

    qb.push("(body #> ");
    qb.push_bind(path.clone());
    qb.push(" = ");
    qb.push_bind(Json(value.clone()));
    qb.push(" OR (jsonb_typeof(body #> ");
    qb.push_bind(path.clone());
    qb.push(") = 'array' AND body #> ");
    qb.push_bind(path);
    qb.push(" @> ");
    qb.push_bind(Json(json!([value])));
    qb.push("))");
}

fn push_lt(qb: &mut QueryBuilder<'_, Postgres>, field: &str, value: &Value) {
    let path = split_path(field);
    match value {
        Value::String(s) => {
            qb.push("(CASE WHEN jsonb_typeof(body #> ");
            qb.push_bind(path.clone());
            qb.push(") <> 'string' THEN FALSE ELSE ");
            match parse_instant(s) {
                Some(instant) => {
                    qb.push("COALESCE(taskboard_instant(body #>> ");
                    qb.push_bind(path);
                    qb.push(") < ");
                    qb.push_bind(instant);
                    qb.push(", FALSE)");
                }
                None => {
                    qb.push("(taskboard_instant(body #>> ");
                    qb.push_bind(path.clone());
                    qb.push(") IS NULL AND (body #>> ");
                    qb.push_bind(path);
                    qb.push(r#") COLLATE "C" < "#);
                    qb.push_bind(s.clone());
                    qb.push(")");
                }
            }
            qb.push(" END)");
        }
        Value::Number(n) => match n.as_f64() {
            Some(n) => {
                qb.push("(CASE WHEN jsonb_typeof(body #> ");
                qb.push_bind(path.clone());
                qb.push(") = 'number' THEN (body #>> ");
                qb.push_bind(path);
                qb.push(")::float8 < ");
                qb.push_bind(n);
                qb.push(" ELSE FALSE END)");
            }
            None => {
                qb.push("FALSE");
            }
        },
        _ => {
            qb.push("FALSE");
        }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Cursor> {
        filter.compile()?;
        let mut qb = Self::select(collection, "body", filter);
        qb.push(" ORDER BY seq");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx(collection))?;
        let docs = rows.iter().map(body_of).collect::<StoreResult<Vec<_>>>()?;

        debug!(collection = %collection, returned = docs.len(), "find");
        Ok(Cursor::new(docs))
    }

    async fn insert_one(&self, collection: Collection, mut doc: Document) -> StoreResult<DocumentId> {
        let id = assign_id(&mut doc)?;

        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection.as_str())
            .bind(Json(id.to_value()))
            .bind(Json(Value::Object(doc)))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx(collection))?;

        Ok(id)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        if update.fields().contains_key(ID_FIELD) {
            return Err(StoreError::InvalidQuery(format!(
                "{ID_FIELD} cannot be updated"
            )));
        }
        filter.compile()?;

        let mut tx = self.pool.begin().await?;

        let mut qb = Self::select(collection, "seq, body", filter);
        qb.push(" ORDER BY seq LIMIT 1 FOR UPDATE");
        let row = qb
            .build()
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx(collection))?;

        let Some(row) = row else {
            return Ok(UpdateOutcome::default());
        };
        let seq: i64 = row.try_get("seq")?;
        let mut body = body_of(&row)?;

        let changed = update.apply(&mut body);
        if changed {
            sqlx::query("UPDATE documents SET body = $1 WHERE seq = $2")
                .bind(Json(Value::Object(body)))
                .bind(seq)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx(collection))?;
        }
        tx.commit().await?;

        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(changed),
        })
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        filter.compile()?;
        let mut qb = QueryBuilder::new("DELETE FROM documents WHERE seq = (");
        qb.push("SELECT seq FROM documents WHERE collection = ");
        qb.push_bind(collection.as_str());
        qb.push(" AND ");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY seq LIMIT 1)");

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx(collection))?;
        Ok(result.rows_affected())
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        filter.compile()?;
        let row = Self::select(collection, "COUNT(*) AS n", filter)
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx(collection))?;
        let n: i64 = row.try_get("n")?;
        Ok(n.max(0) as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(filter: &Filter) -> String {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("");
        push_filter(&mut qb, filter);
        qb.sql().to_string()
    }

    #[test]
    fn test_primary_key_uses_id_column() {
        assert_eq!(sql(&Filter::eq("_id", "0001")), "(id = $1)");
    }

    #[test]
    fn test_eq_covers_array_membership() {
        let s = sql(&Filter::eq("memberIds", "u1"));
        assert!(s.contains("body #> $1 = $2"));
        assert!(s.contains("'array'"));
        assert!(s.contains("@> $5"));
    }

    #[test]
    fn test_ne_negates_with_null_guard() {
        let s = sql(&Filter::ne("status", "Done"));
        assert!(s.starts_with("NOT COALESCE("));
        assert!(s.ends_with(", FALSE)"));
    }

    #[test]
    fn test_lt_on_timestamp_parses_without_raw_cast() {
        let s = sql(&Filter::lt("duedate", "2024-06-01T12:00:00Z"));
        assert!(s.contains("COALESCE(taskboard_instant(body #>> $2) < $3, FALSE)"));
        assert!(!s.contains("::timestamptz"));
    }

    #[test]
    fn test_lt_on_plain_string_skips_instants() {
        let s = sql(&Filter::lt("code", "m"));
        assert!(s.contains("taskboard_instant(body #>> $2) IS NULL"));
        assert!(s.contains(r#"COLLATE "C" < $4"#));
    }

    #[test]
    fn test_lt_on_number_and_unsupported_values() {
        assert!(sql(&Filter::lt("n", 3)).contains("::float8 < $3"));
        assert_eq!(sql(&Filter::lt("n", true)), "FALSE");
    }

    #[test]
    fn test_empty_combinators() {
        assert_eq!(sql(&Filter::And(vec![])), "TRUE");
        assert_eq!(sql(&Filter::Or(vec![])), "FALSE");
        assert_eq!(sql(&Filter::is_in("_id", vec![])), "FALSE");
        assert_eq!(sql(&Filter::All), "TRUE");
    }

    #[test]
    fn test_regex_is_case_insensitive() {
        assert!(sql(&Filter::regex_ci("title", "fix")).contains("~* $3"));
    }

    #[test]
    fn test_composed_filter_numbers_parameters_in_order() {
        let filter = Filter::any_of(vec![Filter::eq("_id", "a"), Filter::eq("_id", "b")]);
        assert_eq!(sql(&filter), "((id = $1) OR (id = $2))");
    }
}
