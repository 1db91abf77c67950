use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use crate::model::tick::PriceTick;

/// Append-only SQLite store for price ticks, keyed by timestamp.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> Result<Connection> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
        }
        let conn = Connection::open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS price_ticks (
                timestamp_ms INTEGER NOT NULL PRIMARY KEY,
                price REAL NOT NULL,
                change_percent REAL NOT NULL,
                up_count INTEGER NOT NULL,
                down_count INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(conn)
    }

    pub fn append(&self, tick: &PriceTick) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            r#"
            INSERT INTO price_ticks (timestamp_ms, price, change_percent, up_count, down_count)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(timestamp_ms) DO UPDATE SET
                price = excluded.price,
                change_percent = excluded.change_percent,
                up_count = excluded.up_count,
                down_count = excluded.down_count
            "#,
            params![
                tick.timestamp.timestamp_millis(),
                tick.price,
                tick.change_percent,
                tick.up_count as i64,
                tick.down_count as i64,
            ],
        )?;
        Ok(())
    }

    /// Ticks within `[from, to]`, ascending by timestamp.
    pub fn query_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<PriceTick>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT timestamp_ms, price, change_percent, up_count, down_count
            FROM price_ticks
            WHERE timestamp_ms >= ?1 AND timestamp_ms <= ?2
            ORDER BY timestamp_ms ASC
            "#,
        )?;

        let rows = stmt.query_map(
            params![from.timestamp_millis(), to.timestamp_millis()],
            row_to_tick,
        )?;

        let mut ticks = Vec::new();
        for row in rows {
            ticks.push(row?);
        }
        Ok(ticks)
    }

    /// Most recent persisted tick, if any.
    pub fn latest(&self) -> Result<Option<PriceTick>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT timestamp_ms, price, change_percent, up_count, down_count
            FROM price_ticks
            ORDER BY timestamp_ms DESC
            LIMIT 1
            "#,
        )?;

        let mut rows = stmt.query_map([], row_to_tick)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }
}

fn row_to_tick(row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceTick> {
    let timestamp_ms: i64 = row.get(0)?;
    Ok(PriceTick {
        timestamp: DateTime::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Integer,
                "timestamp out of range".into(),
            )
        })?,
        price: row.get(1)?,
        change_percent: row.get(2)?,
        up_count: row.get::<_, i64>(3)? as u64,
        down_count: row.get::<_, i64>(4)? as u64,
    })
}
