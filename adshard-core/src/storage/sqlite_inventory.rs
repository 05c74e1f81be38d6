use super::SharedConnection;
use super::inventory_store::InventoryShard;
use super::tuple::{TUPLE_LEN, TupleValue, encode_record};
use crate::model::{RecordKey, ServingRecord};
use crate::{AdError, Result};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use std::path::Path;

const SELECT_COLUMNS: &str =
    "platform_id, device, banner_id, banner_url, banner_text, category_id, img_data, user_id";

/// Inventory shard backed by one SQLite database.
///
/// Columns are declared without type affinity so rows keep exactly the value
/// types they were written with; the tuple decoder enforces the schema on read.
#[derive(Clone)]
pub struct SqliteInventoryShard {
    conn: SharedConnection,
}

impl SqliteInventoryShard {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: SharedConnection::new(conn),
        })
    }

    /// Writes a raw tuple, replacing any row with the same primary key.
    pub async fn insert_tuple(&self, tuple: Vec<TupleValue>) -> Result<()> {
        if tuple.len() < 3 || tuple.len() > TUPLE_LEN {
            return Err(AdError::InvalidRequest(format!(
                "tuple has {} fields",
                tuple.len()
            )));
        }

        let values = tuple
            .iter()
            .map(to_sql_value)
            .collect::<Result<Vec<Value>>>()?;

        self.conn.call(move |conn| {
            let placeholders = (1..=values.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let columns = SELECT_COLUMNS
                .split(", ")
                .take(values.len())
                .collect::<Vec<_>>()
                .join(", ");

            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO serving_records ({}) VALUES ({})",
                    columns, placeholders
                ),
                params_from_iter(values.iter()),
            )?;
            Ok(())
        })
        .await
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS serving_records (
            platform_id,
            device,
            banner_id,
            banner_url,
            banner_text,
            category_id,
            img_data,
            user_id,
            PRIMARY KEY (platform_id, device, banner_id)
        )",
        [],
    )?;

    // Secondary index for the stop scatter.
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_serving_records_banner
         ON serving_records(banner_id)",
        [],
    )?;

    Ok(())
}

fn to_sql_value(value: &TupleValue) -> Result<Value> {
    Ok(match value {
        TupleValue::Null => Value::Null,
        TupleValue::Unsigned(v) => Value::Integer(
            i64::try_from(*v)
                .map_err(|_| AdError::InvalidRequest(format!("id out of range: {}", v)))?,
        ),
        TupleValue::Integer(v) => Value::Integer(*v),
        TupleValue::Real(v) => Value::Real(*v),
        TupleValue::Text(v) => Value::Text(v.clone()),
        TupleValue::Bytes(v) => Value::Blob(v.clone()),
    })
}

fn from_sql_value(value: Value) -> TupleValue {
    match value {
        Value::Null => TupleValue::Null,
        Value::Integer(v) => TupleValue::Integer(v),
        Value::Real(v) => TupleValue::Real(v),
        Value::Text(v) => TupleValue::Text(v),
        Value::Blob(v) => TupleValue::Bytes(v),
    }
}

fn to_sql_id(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| AdError::InvalidRequest(format!("id out of range: {}", id)))
}

fn read_tuples(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Vec<TupleValue>>> {
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();

    let rows = stmt.query_map(params, |row| {
        let mut tuple = Vec::with_capacity(width);
        for idx in 0..width {
            tuple.push(from_sql_value(row.get::<_, Value>(idx)?));
        }
        Ok(tuple)
    })?;

    let mut tuples = Vec::new();
    for row in rows {
        tuples.push(row?);
    }

    Ok(tuples)
}

#[async_trait]
impl InventoryShard for SqliteInventoryShard {
    async fn insert(&self, record: &ServingRecord) -> Result<()> {
        self.insert_tuple(encode_record(record)).await
    }

    async fn select_by_platform(
        &self,
        platform_id: u64,
        device: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Vec<TupleValue>>> {
        let platform_id = to_sql_id(platform_id)?;
        let device = device.to_string();

        self.conn.call(move |conn| {
            read_tuples(
                conn,
                &format!(
                    "SELECT {} FROM serving_records
                     WHERE platform_id = ?1 AND device = ?2
                     ORDER BY banner_id LIMIT ?3 OFFSET ?4",
                    SELECT_COLUMNS
                ),
                params![platform_id, device, limit as i64, offset as i64],
            )
        })
        .await
    }

    async fn select_by_banner(
        &self,
        banner_id: u64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Vec<TupleValue>>> {
        let banner_id = to_sql_id(banner_id)?;

        self.conn.call(move |conn| {
            read_tuples(
                conn,
                &format!(
                    "SELECT {} FROM serving_records
                     WHERE banner_id = ?1
                     ORDER BY platform_id, device LIMIT ?2 OFFSET ?3",
                    SELECT_COLUMNS
                ),
                params![banner_id, limit as i64, offset as i64],
            )
        })
        .await
    }

    async fn delete(&self, key: &RecordKey) -> Result<bool> {
        let platform_id = to_sql_id(key.platform_id)?;
        let banner_id = to_sql_id(key.banner_id)?;
        let device = key.device.clone();

        self.conn.call(move |conn| {
            let affected = conn.execute(
                "DELETE FROM serving_records
                 WHERE platform_id = ?1 AND device = ?2 AND banner_id = ?3",
                params![platform_id, device, banner_id],
            )?;
            Ok(affected > 0)
        })
        .await
    }
}
