use crate::calc::AttendanceStatus;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_delete_failed, db_query_failed, db_update_failed, get_optional_str,
    get_required_str, not_found, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn student_exists(conn: &Connection, student_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(db_query_failed)
}

fn session_exists(conn: &Connection, session_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM sessions WHERE id = ?", [session_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(db_query_failed)
}

fn record_json(student_id: &str, session_id: &str, status: &AttendanceStatus) -> serde_json::Value {
    json!({
        "studentId": student_id,
        "sessionId": session_id,
        "status": status.code(),
        "justification": status.justification()
    })
}

fn attendance_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT student_id, session_id, status, justification
             FROM attendance_records",
        )
        .map_err(db_query_failed)?;
    let records = stmt
        .query_map([], |r| {
            Ok(json!({
                "studentId": r.get::<_, String>(0)?,
                "sessionId": r.get::<_, String>(1)?,
                "status": r.get::<_, String>(2)?,
                "justification": r.get::<_, Option<String>>(3)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query_failed)?;
    Ok(json!({ "records": records }))
}

fn attendance_mark(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let session_id = get_required_str(params, "sessionId")?;
    let status_raw = get_required_str(params, "status")?;
    let justification = get_optional_str(params, "justification");

    let status = AttendanceStatus::from_parts(&status_raw, justification.as_deref())
        .map_err(bad_params)?;

    if !student_exists(conn, &student_id)? {
        return Err(not_found("student not found"));
    }
    if !session_exists(conn, &session_id)? {
        return Err(not_found("session not found"));
    }

    // Upsert keyed on the pair; a repeated mark replaces the prior record,
    // and a non-justified mark clears any stored justification.
    conn.execute(
        "INSERT INTO attendance_records(student_id, session_id, status, justification)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(student_id, session_id) DO UPDATE SET
           status = excluded.status,
           justification = excluded.justification",
        (
            &student_id,
            &session_id,
            status.code(),
            status.justification(),
        ),
    )
    .map_err(db_update_failed)?;

    Ok(json!({ "record": record_json(&student_id, &session_id, &status) }))
}

fn attendance_clear(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let session_id = get_required_str(params, "sessionId")?;

    let removed = conn
        .execute(
            "DELETE FROM attendance_records WHERE student_id = ? AND session_id = ?",
            (&student_id, &session_id),
        )
        .map_err(db_delete_failed)?;
    if removed == 0 {
        return Err(not_found("attendance record not found"));
    }
    Ok(json!({ "ok": true }))
}

fn handle_attendance_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_mark(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_clear(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.list" => Some(handle_attendance_list(state, req)),
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        "attendance.clear" => Some(handle_attendance_clear(state, req)),
        _ => None,
    }
}
