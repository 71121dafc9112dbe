//! SQLite-backed persistence for celltab sheets.
//!
//! One table of `(sheet, cell) → formula` ground facts. No dependency
//! information and no cached values are stored; the engine rebuilds both
//! by replaying formulas on open.

use std::path::Path;

use rusqlite::{params, Connection};

use celltab_engine::store::{SheetStore, StoreError, StoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS formulas (
    sheet   TEXT NOT NULL,
    cell    TEXT NOT NULL,
    formula TEXT NOT NULL,
    PRIMARY KEY (sheet, cell)
);
"#;

/// `(sheet, cell) → formula` store over a single SQLite database file.
pub struct SqliteStore {
    conn: Option<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<SqliteStore> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(SqliteStore { conn: Some(conn) })
    }

    fn conn(&self) -> StoreResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| StoreError::new("store is closed"))
    }
}

fn db_err(err: rusqlite::Error) -> StoreError {
    StoreError::new(err.to_string())
}

impl SheetStore for SqliteStore {
    fn read_formulas(&mut self, sheet: &str) -> StoreResult<Vec<(String, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT cell, formula FROM formulas WHERE sheet = ?1 ORDER BY cell")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![sheet], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(db_err)?);
        }
        Ok(out)
    }

    fn update_cell(&mut self, sheet: &str, cell: &str, formula: &str) -> StoreResult<()> {
        self.conn()?
            .execute(
                "INSERT INTO formulas (sheet, cell, formula) VALUES (?1, ?2, ?3)
                 ON CONFLICT (sheet, cell) DO UPDATE SET formula = excluded.formula",
                params![sheet, cell, formula],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn delete(&mut self, sheet: &str, cell: &str) -> StoreResult<()> {
        self.conn()?
            .execute(
                "DELETE FROM formulas WHERE sheet = ?1 AND cell = ?2",
                params![sheet, cell],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn clear(&mut self, sheet: &str) -> StoreResult<()> {
        self.conn()?
            .execute("DELETE FROM formulas WHERE sheet = ?1", params![sheet])
            .map_err(db_err)?;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| db_err(err))?;
        }
        Ok(())
    }
}
