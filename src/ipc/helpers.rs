use rusqlite::Connection;

use crate::calc::{AttendanceStatus, MarkMap, SessionRef};
use crate::export::StudentRef;
use crate::ipc::error::err;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn bad_params(message: impl Into<String>) -> HandlerErr {
    HandlerErr::new("bad_params", message)
}

pub fn not_found(message: impl Into<String>) -> HandlerErr {
    HandlerErr::new("not_found", message)
}

pub fn db_query_failed(e: impl ToString) -> HandlerErr {
    HandlerErr::new("db_query_failed", e.to_string())
}

pub fn db_update_failed(e: impl ToString) -> HandlerErr {
    HandlerErr::new("db_update_failed", e.to_string())
}

pub fn db_delete_failed(e: impl ToString) -> HandlerErr {
    HandlerErr::new("db_delete_failed", e.to_string())
}

pub fn db_tx_failed(e: impl ToString) -> HandlerErr {
    HandlerErr::new("db_tx_failed", e.to_string())
}

pub fn db_commit_failed(e: impl ToString) -> HandlerErr {
    HandlerErr::new("db_commit_failed", e.to_string())
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn load_students(conn: &Connection) -> Result<Vec<StudentRef>, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT id, name FROM students ORDER BY name")
        .map_err(db_query_failed)?;
    stmt.query_map([], |r| {
        Ok(StudentRef {
            id: r.get(0)?,
            name: r.get(1)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_query_failed)
}

pub fn load_sessions(conn: &Connection) -> Result<Vec<SessionRef>, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT id, part, number FROM sessions ORDER BY number")
        .map_err(db_query_failed)?;
    stmt.query_map([], |r| {
        Ok(SessionRef {
            id: r.get(0)?,
            part: r.get(1)?,
            number: r.get(2)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_query_failed)
}

pub fn load_marks(conn: &Connection) -> Result<MarkMap, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT student_id, session_id, status, justification FROM attendance_records")
        .map_err(db_query_failed)?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, Option<String>>(3)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query_failed)?;

    let mut marks = MarkMap::new();
    for (student_id, session_id, status, justification) in rows {
        // Rows were validated on write; a row that no longer parses is a
        // corrupt store, not a caller mistake.
        let status = AttendanceStatus::from_parts(&status, justification.as_deref())
            .map_err(|msg| HandlerErr::new("db_query_failed", msg))?;
        marks.insert((student_id, session_id), status);
    }
    Ok(marks)
}
