//! libSQL storage layer for the package store (offline mode).
//!
//! **Access rules:**
//! - The build writes through [`Store`], one [`StoreTx`] per package.
//! - Queries read through [`ReadOnlyStore`], opened with read-only flags once
//!   the build has finished.

pub mod rows;
pub mod schema;

use std::path::Path;

use fleetsql_shared::{FleetSqlError, Result};
use libsql::{Connection, Database, Transaction, Value};

pub use rows::Record;
pub use schema::table_schemas;

fn storage_err(e: libsql::Error) -> FleetSqlError {
    FleetSqlError::Storage(e.to_string())
}

// ---------------------------------------------------------------------------
// Read-write store
// ---------------------------------------------------------------------------

/// Read-write handle used while building.
pub struct Store {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Store {
    /// Create a fresh database at `path`, replacing any file already there.
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| FleetSqlError::io(parent, e))?;
        }
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(?path, "removed stale database"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(FleetSqlError::io(path, e)),
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self { db, conn })
    }

    /// Create every table inside one transaction.
    pub async fn create_tables(&self) -> Result<()> {
        let tx = self.transaction().await?;
        for stmt in table_schemas() {
            let result = tx.tx.execute_batch(stmt).await;
            if let Err(e) = result {
                tx.rollback().await?;
                return Err(FleetSqlError::Storage(format!("failed creating table: {e}")));
            }
        }
        tx.commit().await
    }

    /// Begin a transaction.
    pub async fn transaction(&self) -> Result<StoreTx> {
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        Ok(StoreTx { tx })
    }
}

/// An open write transaction. Dropping it without committing rolls back.
pub struct StoreTx {
    tx: Transaction,
}

impl StoreTx {
    /// Insert `row` into its table and return the generated row id.
    pub async fn insert<R: Record>(&self, row: &R) -> Result<i64> {
        let columns = R::columns();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            R::TABLE,
            columns.join(", "),
            placeholders.join(", ")
        );

        self.tx
            .execute(&sql, libsql::params_from_iter(row.values()))
            .await
            .map_err(|e| FleetSqlError::Storage(format!("insert into {}: {e}", R::TABLE)))?;
        Ok(self.tx.last_insert_rowid())
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(storage_err)
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(storage_err)
    }
}

// ---------------------------------------------------------------------------
// Read-only store
// ---------------------------------------------------------------------------

/// A row returned by [`ReadOnlyStore::query`], columns in statement order.
pub type JsonRow = serde_json::Map<String, serde_json::Value>;

/// Read-only handle to a finished store.
pub struct ReadOnlyStore {
    db: Database,
}

impl ReadOnlyStore {
    pub async fn open(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .flags(libsql::OpenFlags::SQLITE_OPEN_READ_ONLY)
            .build()
            .await
            .map_err(storage_err)?;

        Ok(Self { db })
    }

    /// Run `statement` and collect every row.
    ///
    /// Each call uses its own connection so concurrent queries never share
    /// statement state. Errors from the engine are returned verbatim.
    pub async fn query(&self, statement: &str) -> Result<Vec<JsonRow>> {
        let conn = self.db.connect().map_err(storage_err)?;
        let mut rows = conn
            .query(statement, ())
            .await
            .map_err(|e| FleetSqlError::Query(e.to_string()))?;

        let names: Vec<String> = (0..rows.column_count())
            .map(|i| rows.column_name(i).unwrap_or_default().to_string())
            .collect();

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| FleetSqlError::Query(e.to_string()))?
        {
            let mut obj = JsonRow::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let value = row
                    .get_value(i as i32)
                    .map_err(|e| FleetSqlError::Query(e.to_string()))?;
                obj.insert(name.clone(), to_json(value));
            }
            out.push(obj);
        }
        Ok(out)
    }
}

fn to_json(value: Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Null => Json::Null,
        Value::Integer(i) => Json::from(i),
        Value::Real(f) => serde_json::Number::from_f64(f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Text(s) => Json::String(s),
        Value::Blob(b) => Json::String(String::from_utf8_lossy(&b).into_owned()),
    }
}
