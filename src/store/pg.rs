use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{
    prepare_new, stamp_updated, Filter, FilterOp, Record, RecordStore, StoreError,
    KNOWN_COLLECTIONS,
};

/// Postgres-backed record store.
///
/// Each collection maps to a table of shape `(id uuid primary key, data
/// jsonb)`. Collection names are validated against the known-collection list
/// before they are spliced into SQL, so identifiers never come from request
/// data.
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self::new(pool))
    }

    fn table(collection: &str) -> Result<&str, StoreError> {
        KNOWN_COLLECTIONS
            .iter()
            .find(|known| **known == collection)
            .copied()
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    /// Render the filter into a WHERE clause over the jsonb column. Values
    /// are always bound, never interpolated.
    fn where_clause(filter: &Filter, first_param: usize) -> (String, Vec<BoundValue>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();
        let mut idx = first_param;

        for cond in &filter.conditions {
            // Field names come from handler code, not callers, but quote the
            // json path anyway.
            let path = format!("data->>'{}'", cond.field.replace('\'', "''"));
            match cond.op {
                FilterOp::Eq => {
                    clauses.push(format!("{} = ${}", path, idx));
                    params.push(BoundValue::Text(value_as_text(&cond.value)));
                    idx += 1;
                }
                FilterOp::Ne => {
                    clauses.push(format!("{} IS DISTINCT FROM ${}", path, idx));
                    params.push(BoundValue::Text(value_as_text(&cond.value)));
                    idx += 1;
                }
                FilterOp::In => {
                    clauses.push(format!("{} = ANY(${})", path, idx));
                    let values = cond
                        .value
                        .as_array()
                        .map(|vs| vs.iter().map(value_as_text).collect())
                        .unwrap_or_default();
                    params.push(BoundValue::TextArray(values));
                    idx += 1;
                }
            }
        }

        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        (sql, params)
    }
}

enum BoundValue {
    Text(String),
    TextArray(Vec<String>),
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    params: &'q [BoundValue],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for param in params {
        query = match param {
            BoundValue::Text(s) => query.bind(s),
            BoundValue::TextArray(v) => query.bind(v),
        };
    }
    query
}

fn row_data(row: &sqlx::postgres::PgRow) -> Result<Record, StoreError> {
    let value: Value = row
        .try_get("data")
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(format!(
            "expected object row, got {}",
            other
        ))),
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find(&self, collection: &str, id: Uuid) -> Result<Option<Record>, StoreError> {
        let table = Self::table(collection)?;
        let sql = format!("SELECT data FROM {} WHERE id = $1", table);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.as_ref().map(row_data).transpose()
    }

    async fn list(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let table = Self::table(collection)?;
        let (where_sql, params) = Self::where_clause(filter, 1);
        let mut sql = format!(
            "SELECT data FROM {}{} ORDER BY data->>'created_at', id",
            table, where_sql
        );
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit.max(0)));
        }
        if let Some(offset) = filter.offset {
            sql.push_str(&format!(" OFFSET {}", offset.max(0)));
        }

        let rows = bind_params(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.iter().map(row_data).collect()
    }

    async fn create(&self, collection: &str, record: Record) -> Result<Record, StoreError> {
        let table = Self::table(collection)?;
        let (id, record) = prepare_new(record);
        let sql = format!(
            "INSERT INTO {} (id, data) VALUES ($1, $2) RETURNING data",
            table
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(Value::Object(record))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row_data(&row)
    }

    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        mut patch: Record,
    ) -> Result<Record, StoreError> {
        let table = Self::table(collection)?;
        stamp_updated(&mut patch);
        let sql = format!(
            "UPDATE {} SET data = data || $2 WHERE id = $1 RETURNING data",
            table
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(Value::Object(patch))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        row_data(&row)
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<Record, StoreError> {
        let table = Self::table(collection)?;
        let sql = format!("DELETE FROM {} WHERE id = $1 RETURNING data", table);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        row_data(&row)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<i64, StoreError> {
        let table = Self::table(collection)?;
        let (where_sql, params) = Self::where_clause(filter, 1);
        let sql = format!("SELECT COUNT(*) AS total FROM {}{}", table, where_sql);
        let row = bind_params(sqlx::query(&sql), &params)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.try_get::<i64, _>("total")
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
