use crate::model::Platform;
use crate::storage::SharedConnection;
use crate::{AdError, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

#[async_trait]
pub trait PlatformDirectory: Send + Sync {
    async fn platforms_by_category(&self, category_id: u64) -> Result<Vec<Platform>>;
}

#[derive(Clone)]
pub struct SqlitePlatformDirectory {
    conn: SharedConnection,
}

impl SqlitePlatformDirectory {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_connection(Connection::open(path.as_ref())?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS platforms (
                platform_id INTEGER PRIMARY KEY,
                category_id INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_platforms_category ON platforms(category_id)",
            [],
        )?;

        Ok(Self {
            conn: SharedConnection::new(conn),
        })
    }

    pub async fn add_platform(&self, platform: Platform) -> Result<()> {
        let platform_id = to_sql_id(platform.platform_id)?;
        let category_id = to_sql_id(platform.category_id)?;

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO platforms (platform_id, category_id) VALUES (?1, ?2)",
                    params![platform_id, category_id],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn delete_platform(&self, platform_id: u64) -> Result<bool> {
        let platform_id = to_sql_id(platform_id)?;

        self.conn
            .call(move |conn| {
                let affected = conn.execute(
                    "DELETE FROM platforms WHERE platform_id = ?1",
                    params![platform_id],
                )?;
                Ok(affected > 0)
            })
            .await
    }

    pub async fn get_platform(&self, platform_id: u64) -> Result<Platform> {
        let sql_id = to_sql_id(platform_id)?;

        let found = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT platform_id, category_id FROM platforms WHERE platform_id = ?1",
                        params![sql_id],
                        read_platform,
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        found.ok_or_else(|| AdError::not_found("platform", platform_id))
    }

    pub async fn platforms(&self) -> Result<Vec<Platform>> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT platform_id, category_id FROM platforms ORDER BY platform_id",
                )?;
                let rows = stmt.query_map([], read_platform)?;

                let mut platforms = Vec::new();
                for row in rows {
                    platforms.push(row?);
                }
                Ok(platforms)
            })
            .await
    }
}

#[async_trait]
impl PlatformDirectory for SqlitePlatformDirectory {
    async fn platforms_by_category(&self, category_id: u64) -> Result<Vec<Platform>> {
        let category_id = to_sql_id(category_id)?;

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT platform_id, category_id FROM platforms
                     WHERE category_id = ?1 ORDER BY platform_id",
                )?;
                let rows = stmt.query_map(params![category_id], read_platform)?;

                let mut platforms = Vec::new();
                for row in rows {
                    platforms.push(row?);
                }
                Ok(platforms)
            })
            .await
    }
}

fn read_platform(row: &rusqlite::Row<'_>) -> rusqlite::Result<Platform> {
    let platform_id: i64 = row.get(0)?;
    let category_id: i64 = row.get(1)?;

    Ok(Platform {
        platform_id: platform_id as u64,
        category_id: category_id as u64,
    })
}

fn to_sql_id(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| AdError::InvalidRequest(format!("id out of range: {}", id)))
}
