//! SQLite-backed document store.
//!
//! A [`Database`] wraps one long-lived connection behind a mutex. Handles are
//! cheap to clone and share that connection.

mod chapters;
mod files;
mod schema;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};

use crate::config::default_database_path;
use crate::error::{Error, Result};
use crate::models::{
    DEFAULT_FIELD_ID, DEFAULT_FIELD_NAME, DEFAULT_FILE_TYPE_FOLDER, DEFAULT_FILE_TYPE_ID,
    DEFAULT_FILE_TYPE_NAME,
};

pub use schema::SCHEMA;

#[derive(Clone)]
pub struct Database {
    /// `None` when startup failed; every operation then reports `NotInitialized`.
    conn: Option<Arc<Mutex<Connection>>>,
}

impl Database {
    /// Open the database at the per-user data path.
    pub fn open_default() -> Result<Self> {
        Self::open(default_database_path())
    }

    /// Open (or create) the database file at `path`, apply the schema and seed
    /// default rows.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!("Opening database at {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Open like [`Database::open`], but never fail: startup errors are logged
    /// and the returned handle answers every call with [`Error::NotInitialized`].
    pub fn initialize(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(db) => db,
            Err(e) => {
                tracing::error!("Database init failed for {}: {}", path.display(), e);
                Self { conn: None }
            }
        }
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        tracing::debug!("Database journal mode: {}", journal_mode);

        let db = Self {
            conn: Some(Arc::new(Mutex::new(conn))),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Apply the schema and seed defaults. Safe to run repeatedly.
    pub fn migrate(&self) -> Result<()> {
        self.with_transaction(|tx| {
            tx.execute_batch(SCHEMA)?;
            seed_defaults(tx)
        })
    }

    pub fn is_ready(&self) -> bool {
        self.conn.is_some()
    }

    /// Run `f` against the shared connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.as_ref().ok_or(Error::NotInitialized)?;
        let guard = conn.lock();
        f(&*guard)
    }

    /// Run `f` inside a transaction that commits only if `f` returns `Ok`.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let conn = self.conn.as_ref().ok_or(Error::NotInitialized)?;
        let mut guard = conn.lock();
        let tx = guard.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Release the connection. If other clones are still alive the connection
    /// stays open until the last one is dropped.
    pub fn close(self) -> Result<()> {
        let Some(conn) = self.conn else {
            return Ok(());
        };

        match Arc::try_unwrap(conn) {
            Ok(mutex) => {
                mutex.into_inner().close().map_err(|(_, e)| Error::from(e))?;
                tracing::info!("Database closed");
                Ok(())
            }
            Err(_) => {
                tracing::debug!("Database still shared, deferring close");
                Ok(())
            }
        }
    }
}

fn seed_defaults(conn: &Connection) -> Result<()> {
    let field_count: i64 = conn.query_row("SELECT COUNT(*) FROM fields", [], |row| row.get(0))?;
    if field_count == 0 {
        tracing::info!("Seeding default field");
        conn.execute(
            "INSERT INTO fields (id, name) VALUES (?1, ?2)",
            [DEFAULT_FIELD_ID, DEFAULT_FIELD_NAME],
        )?;
    }

    let type_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM file_types", [], |row| row.get(0))?;
    if type_count == 0 {
        tracing::info!("Seeding default file type");
        conn.execute(
            "INSERT INTO file_types (id, name, folder_name) VALUES (?1, ?2, ?3)",
            [
                DEFAULT_FILE_TYPE_ID,
                DEFAULT_FILE_TYPE_NAME,
                DEFAULT_FILE_TYPE_FOLDER,
            ],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(db: &Database, table: &str) -> i64 {
        db.with_connection(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?)
        })
        .unwrap()
    }

    #[test]
    fn migrate_is_idempotent_and_seeds_once() {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        db.migrate().unwrap();

        assert_eq!(count(&db, "fields"), 1);
        assert_eq!(count(&db, "file_types"), 1);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let db = Database::open_memory().unwrap();
        let enabled: i64 = db
            .with_connection(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(enabled, 1);

        let err = db
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO chapters (id, name, field_id) VALUES ('c1', 'Orphan', 'nope')",
                    [],
                )?;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConstraintViolation);
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = Database::open_memory().unwrap();
        let result: Result<()> = db.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO fields (id, name) VALUES ('f2', 'Geometry')",
                [],
            )?;
            Err(Error::NotFound("forced".into()))
        });

        assert!(result.is_err());
        assert_eq!(count(&db, "fields"), 1);
    }

    #[test]
    fn uninitialized_handle_reports_not_initialized() {
        let db = Database { conn: None };
        assert!(!db.is_ready());
        let err = db.with_connection(|_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
        assert!(db.close().is_ok());
    }

    #[test]
    fn close_releases_sole_handle() {
        let db = Database::open_memory().unwrap();
        assert!(db.close().is_ok());
    }
}
