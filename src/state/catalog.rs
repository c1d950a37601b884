use rusqlite::{Connection, ErrorCode, OptionalExtension};
use std::path::{Path, PathBuf};

use super::data::{Session, StepRecord};
use crate::error::CatalogError;

/// A sample file to register in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct NewSample {
    pub session: Session,
    pub step: u64,
    pub wall_time: f64,
    pub path: PathBuf,
}

/// The Catalog manages the SQLite database of imported samples.
/// It stores one row per (run, tag, step) image and where to read it from.
pub struct Catalog {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl Catalog {
    /// Open (or create) the catalog at `db_path`
    pub fn open(db_path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CatalogError::DataDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(db_path)?;
        tracing::debug!(path = %db_path.display(), "📁 catalog opened");

        let mut catalog = Catalog {
            conn,
            db_path: Some(db_path.to_path_buf()),
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// An in-memory catalog, gone when dropped
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let mut catalog = Catalog {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// Where the catalog lives by default:
    /// - Linux: ~/.local/share/sample-viewer/samples.db
    /// - macOS: ~/Library/Application Support/sample-viewer/samples.db
    /// - Windows: %APPDATA%\sample-viewer\samples.db
    pub fn default_path() -> Result<PathBuf, CatalogError> {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(CatalogError::NoDataDir)?;
        path.push("sample-viewer");
        path.push("samples.db");
        Ok(path)
    }

    fn init_schema(&mut self) -> Result<(), CatalogError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS samples (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                run             TEXT NOT NULL,
                tag             TEXT NOT NULL,
                step            INTEGER NOT NULL,
                wall_time       REAL NOT NULL,
                path            TEXT NOT NULL UNIQUE,
                imported_at     INTEGER NOT NULL,
                UNIQUE(run, tag, step)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_samples_session
             ON samples(run, tag, step)",
            [],
        )?;

        Ok(())
    }

    /// Path to the database file; `None` for in-memory catalogs
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn sample_count(&self) -> Result<i64, CatalogError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Register a sample. Returns false if it was already in the catalog.
    pub fn insert_sample(&self, sample: &NewSample) -> Result<bool, CatalogError> {
        let result = self.conn.execute(
            "INSERT INTO samples (run, tag, step, wall_time, path, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                &sample.session.run,
                &sample.session.tag,
                sample.step as i64,
                sample.wall_time,
                sample.path.to_string_lossy().into_owned(),
                chrono::Utc::now().timestamp(),
            ],
        );

        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// All (run, tag) pairs with at least one sample, sorted
    pub fn sessions(&self) -> Result<Vec<Session>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT run, tag FROM samples ORDER BY run, tag")?;
        let sessions = stmt
            .query_map([], |row| Ok(Session::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// The session's steps in ascending order
    pub fn step_list(&self, session: &Session) -> Result<Vec<StepRecord>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT step, wall_time FROM samples
             WHERE run = ?1 AND tag = ?2
             ORDER BY step",
        )?;
        let steps = stmt
            .query_map(rusqlite::params![&session.run, &session.tag], |row| {
                Ok(StepRecord {
                    step: row.get::<_, i64>(0)? as u64,
                    wall_time: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(steps)
    }

    /// Where the sample for `step` is stored, if it was imported
    pub fn sample_path(&self, session: &Session, step: u64) -> Result<Option<PathBuf>, CatalogError> {
        let path: Option<String> = self
            .conn
            .query_row(
                "SELECT path FROM samples WHERE run = ?1 AND tag = ?2 AND step = ?3",
                rusqlite::params![&session.run, &session.tag, step as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path.map(PathBuf::from))
    }

    /// Drop catalog rows whose image file no longer exists on disk
    pub fn prune_missing(&self) -> Result<usize, CatalogError> {
        let mut stmt = self.conn.prepare("SELECT id, path FROM samples")?;
        let rows: Vec<(i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut removed = 0;
        for (id, path) in rows {
            if !Path::new(&path).exists() {
                self.conn
                    .execute("DELETE FROM samples WHERE id = ?1", rusqlite::params![id])?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, "🔄 pruned samples with missing files");
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("db_path", &self.db_path)
            .finish()
    }
}
