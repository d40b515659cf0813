use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DEFAULT_TOTAL_SESSIONS: i64 = 14;
pub const DEFAULT_FIRST_PART_SESSIONS: i64 = 7;
pub const DEFAULT_ATTENDANCE_THRESHOLD: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub total_sessions: i64,
    pub first_part_sessions: i64,
    pub attendance_threshold: i64,
}

impl Settings {
    pub fn defaults() -> Self {
        Self {
            total_sessions: DEFAULT_TOTAL_SESSIONS,
            first_part_sessions: DEFAULT_FIRST_PART_SESSIONS,
            attendance_threshold: DEFAULT_ATTENDANCE_THRESHOLD,
        }
    }
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("asistencia.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions(
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            part INTEGER NOT NULL,
            number INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_number ON sessions(number)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            student_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            status TEXT NOT NULL,
            justification TEXT,
            PRIMARY KEY(student_id, session_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(session_id) REFERENCES sessions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_records_student ON attendance_records(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_records_session ON attendance_records(session_id)",
        [],
    )?;

    // Singleton row; the CHECK keeps a second instance from ever existing.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            id INTEGER PRIMARY KEY CHECK(id = 1),
            total_sessions INTEGER NOT NULL,
            first_part_sessions INTEGER NOT NULL,
            attendance_threshold INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

/// Returns the settings singleton, inserting the defaults on first read.
pub fn load_settings(conn: &Connection) -> anyhow::Result<Settings> {
    let existing = conn
        .query_row(
            "SELECT total_sessions, first_part_sessions, attendance_threshold
             FROM settings WHERE id = 1",
            [],
            |r| {
                Ok(Settings {
                    total_sessions: r.get(0)?,
                    first_part_sessions: r.get(1)?,
                    attendance_threshold: r.get(2)?,
                })
            },
        )
        .optional()?;
    if let Some(s) = existing {
        return Ok(s);
    }

    let defaults = Settings::defaults();
    // INSERT OR IGNORE keeps the read idempotent even if a row appeared
    // between the read above and this write.
    conn.execute(
        "INSERT OR IGNORE INTO settings(id, total_sessions, first_part_sessions, attendance_threshold)
         VALUES(1, ?, ?, ?)",
        (
            defaults.total_sessions,
            defaults.first_part_sessions,
            defaults.attendance_threshold,
        ),
    )?;
    load_settings_existing(conn)
}

fn load_settings_existing(conn: &Connection) -> anyhow::Result<Settings> {
    Ok(conn.query_row(
        "SELECT total_sessions, first_part_sessions, attendance_threshold
         FROM settings WHERE id = 1",
        [],
        |r| {
            Ok(Settings {
                total_sessions: r.get(0)?,
                first_part_sessions: r.get(1)?,
                attendance_threshold: r.get(2)?,
            })
        },
    )?)
}

/// Persists validated settings, create-if-absent else update-in-place.
pub fn store_settings(conn: &Connection, settings: Settings) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(id, total_sessions, first_part_sessions, attendance_threshold)
         VALUES(1, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           total_sessions = excluded.total_sessions,
           first_part_sessions = excluded.first_part_sessions,
           attendance_threshold = excluded.attendance_threshold",
        (
            settings.total_sessions,
            settings.first_part_sessions,
            settings.attendance_threshold,
        ),
    )?;
    Ok(())
}
