//! SQLite price store.
//!
//! Dates persist as `YYYY-MM-DD` text so lexical order matches date order.

use crate::domain::asset::{Asset, AssetSpec};
use crate::domain::error::MelaoError;
use crate::domain::price::{RawPrice, sanitize};
use crate::domain::price_matrix::PriceMatrix;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_store_port::PriceStore;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> MelaoError {
    MelaoError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> MelaoError {
    MelaoError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date(text: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            text.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

fn asset_id(conn: &Connection, code: &str) -> Result<Option<i64>, MelaoError> {
    conn.query_row(
        "SELECT id FROM assets WHERE code = ?1",
        params![code],
        |row| row.get(0),
    )
    .optional()
    .map_err(query_err)
}

fn row_to_asset(row: &rusqlite::Row<'_>) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, MelaoError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| MelaoError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path)
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        tracing::debug!(path = %db_path, pool_size, "opened sqlite store");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, MelaoError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, MelaoError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), MelaoError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS assets (
                id INTEGER PRIMARY KEY,
                code TEXT UNIQUE NOT NULL,
                name TEXT
            );
            CREATE TABLE IF NOT EXISTS prices (
                asset_id INTEGER NOT NULL REFERENCES assets(id),
                date TEXT NOT NULL,
                price REAL NOT NULL,
                PRIMARY KEY (asset_id, date)
            );
            CREATE INDEX IF NOT EXISTS idx_prices_date ON prices(date);",
        )
        .map_err(query_err)?;

        Ok(())
    }
}

impl PriceStore for SqliteAdapter {
    fn last_date(&self, code: &str) -> Result<Option<NaiveDate>, MelaoError> {
        let conn = self.conn()?;

        let max: Option<String> = conn
            .query_row(
                "SELECT MAX(p.date) FROM prices p
                 JOIN assets a ON a.id = p.asset_id
                 WHERE a.code = ?1",
                params![code],
                |row| row.get(0),
            )
            .map_err(query_err)?;

        max.map(|s| parse_date(s).map_err(query_err)).transpose()
    }

    fn upsert_batch(&self, code: &str, records: &[RawPrice]) -> Result<usize, MelaoError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let id = asset_id(&tx, code)?.ok_or_else(|| MelaoError::UnknownAsset {
            code: code.to_string(),
        })?;

        let batch = sanitize(records);
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO prices (asset_id, date, price)
                     VALUES (?1, ?2, ?3)",
                )
                .map_err(query_err)?;

            for (date, price) in &batch.points {
                inserted += stmt
                    .execute(params![id, date.format(DATE_FORMAT).to_string(), price])
                    .map_err(query_err)?;
            }
        }

        tx.commit().map_err(query_err)?;

        if batch.rejected > 0 {
            tracing::debug!(asset = code, rejected = batch.rejected, "dropped malformed records");
        }
        Ok(inserted)
    }

    fn load_matrix(&self) -> Result<PriceMatrix, MelaoError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT a.code, p.date, p.price
                 FROM prices p
                 JOIN assets a ON a.id = p.asset_id
                 ORDER BY a.code, p.date",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map([], |row| {
                let code: String = row.get(0)?;
                let date = parse_date(row.get(1)?)?;
                let price: f64 = row.get(2)?;
                Ok((code, date, price))
            })
            .map_err(query_err)?;

        let mut observations = Vec::new();
        for row in rows {
            observations.push(row.map_err(query_err)?);
        }

        Ok(PriceMatrix::from_observations(observations))
    }

    fn ensure_asset(&self, spec: &AssetSpec) -> Result<Asset, MelaoError> {
        let conn = self.conn()?;

        let added = conn
            .execute(
                "INSERT OR IGNORE INTO assets (code, name) VALUES (?1, ?2)",
                params![spec.code, spec.name],
            )
            .map_err(query_err)?;
        if added > 0 {
            tracing::info!(asset = %spec.code, "registered new asset");
        }

        conn.query_row(
            "SELECT id, code, name FROM assets WHERE code = ?1",
            params![spec.code],
            row_to_asset,
        )
        .map_err(query_err)
    }

    fn find_asset(&self, code: &str) -> Result<Option<Asset>, MelaoError> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT id, code, name FROM assets WHERE code = ?1",
            params![code],
            row_to_asset,
        )
        .optional()
        .map_err(query_err)
    }

    fn list_assets(&self) -> Result<Vec<Asset>, MelaoError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT id, code, name FROM assets ORDER BY code")
            .map_err(query_err)?;

        let rows = stmt.query_map([], row_to_asset).map_err(query_err)?;

        let mut assets = Vec::new();
        for row in rows {
            assets.push(row.map_err(query_err)?);
        }
        Ok(assets)
    }

    fn data_range(&self, code: &str) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MelaoError> {
        let conn = self.conn()?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(p.date), MAX(p.date), COUNT(*) FROM prices p
                 JOIN assets a ON a.id = p.asset_id
                 WHERE a.code = ?1",
                params![code],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let min = parse_date(min_str).map_err(query_err)?;
                let max = parse_date(max_str).map_err(query_err)?;
                Ok(Some((min, max, count as usize)))
            }
            _ => Ok(None),
        }
    }

    fn seed_catalog(&self, specs: &[AssetSpec]) -> Result<usize, MelaoError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut added = 0;
        {
            let mut stmt = tx
                .prepare("INSERT OR IGNORE INTO assets (code, name) VALUES (?1, ?2)")
                .map_err(query_err)?;
            for spec in specs {
                added += stmt
                    .execute(params![spec.code, spec.name])
                    .map_err(query_err)?;
            }
        }

        tx.commit().map_err(query_err)?;
        tracing::info!(added, total = specs.len(), "seeded asset catalog");
        Ok(added)
    }
}
