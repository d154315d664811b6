//! sqlite-adapter: SQLite implementation of the EventRepository port for local/dev.
//!
//! Purpose
//! - Provide a lightweight, file-based store for submitted events so the
//!   service runs locally without a database server.
//! - Implements the `EventRepository` trait from the `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Stores the submission timestamp as seconds since UNIX_EPOCH.
//! - A UNIQUE constraint over (name, date, time, location_name) turns a
//!   repeated submission into `CoreError::AlreadyExists`.

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use domain::{CoreError, EventRepository, NewEvent, StoredEvent};
use rusqlite::{params, Connection};

const SELECT_COLUMNS: &str = "SELECT id, name, price, description, link, kids, location_name, date, time, business, email, date_submitted FROM user_submitted_event";

/// SQLite-backed event repository for local development.
pub struct SqliteEventRepo {
    conn: Mutex<Connection>,
}

impl SqliteEventRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open a private in-memory database; contents vanish with the value.
    pub fn in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Like [`SqliteEventRepo::new`], creating the parent directory first.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        if let Some(dir) = path.as_ref().parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        Self::new(path)
    }

    /// Construct from env var `DB_PATH` (defaults to `./data/events.db`).
    pub fn from_env() -> Result<Self, CoreError> {
        let path = std::env::var("DB_PATH").unwrap_or_else(|_| "./data/events.db".to_string());
        Self::open(path)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS user_submitted_event (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            price REAL,
            description TEXT,
            link TEXT NOT NULL,
            kids INTEGER,
            location_name TEXT NOT NULL,
            date TEXT NOT NULL,
            time TEXT NOT NULL,
            business TEXT NOT NULL,
            email TEXT NOT NULL,
            date_submitted INTEGER NOT NULL,
            UNIQUE (name, date, time, location_name)
        );
        CREATE INDEX IF NOT EXISTS idx_user_submitted_event_date_submitted
            ON user_submitted_event(date_submitted);
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

fn system_time_to_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or(Duration::from_secs(0)).as_secs()
}

fn secs_to_system_time(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn row_to_event(row: &rusqlite::Row) -> Result<StoredEvent, CoreError> {
    let id: i64 = row.get(0).map_err(map_sqerr)?;
    let submitted: i64 = row.get(11).map_err(map_sqerr)?;
    Ok(StoredEvent {
        id: id as u64,
        name: row.get(1).map_err(map_sqerr)?,
        price: row.get(2).map_err(map_sqerr)?,
        description: row.get(3).map_err(map_sqerr)?,
        link: row.get(4).map_err(map_sqerr)?,
        kids: row.get(5).map_err(map_sqerr)?,
        location: row.get(6).map_err(map_sqerr)?,
        date: row.get(7).map_err(map_sqerr)?,
        time: row.get(8).map_err(map_sqerr)?,
        organization: row.get(9).map_err(map_sqerr)?,
        email: row.get(10).map_err(map_sqerr)?,
        submitted_at: secs_to_system_time(submitted as u64),
    })
}

impl EventRepository for SqliteEventRepo {
    fn insert(&self, event: NewEvent) -> Result<StoredEvent, CoreError> {
        let conn = self.lock()?;
        let res = conn.execute(
            "INSERT INTO user_submitted_event(name, price, description, link, kids, location_name, date, time, business, email, date_submitted) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                event.name,
                event.price,
                event.description,
                event.link,
                event.kids,
                event.location,
                event.date,
                event.time,
                event.organization,
                event.email,
                system_time_to_secs(event.submitted_at) as i64,
            ],
        );
        match res {
            Ok(_) => {
                let id = conn.last_insert_rowid() as u64;
                Ok(StoredEvent::from_new(id, event))
            }
            Err(e) => {
                if let rusqlite::Error::SqliteFailure(err, _) = &e {
                    if err.code == rusqlite::ErrorCode::ConstraintViolation {
                        return Err(CoreError::AlreadyExists);
                    }
                }
                Err(map_sqerr(e))
            }
        }
    }

    fn get(&self, id: u64) -> Result<Option<StoredEvent>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![id as i64]).map_err(map_sqerr)?;
        if let Some(row) = rows.next().map_err(map_sqerr)? {
            Ok(Some(row_to_event(row)?))
        } else {
            Ok(None)
        }
    }

    fn list(&self, limit: usize) -> Result<Vec<StoredEvent>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_COLUMNS} ORDER BY date_submitted DESC, id DESC LIMIT ?1"
            ))
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![limit as i64]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(row_to_event(row)?);
        }
        Ok(out)
    }
}
