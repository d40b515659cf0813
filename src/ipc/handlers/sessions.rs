use crate::calc;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_commit_failed, db_delete_failed, db_query_failed, db_tx_failed,
    db_update_failed, get_optional_str, get_required_str, not_found, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn session_count(conn: &Connection) -> Result<i64, HandlerErr> {
    conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
        .map_err(db_query_failed)
}

// High-water mark, not the row count: a deleted session's number must not
// be handed out again.
fn highest_session_number(conn: &Connection) -> Result<i64, HandlerErr> {
    conn.query_row("SELECT COALESCE(MAX(number), 0) FROM sessions", [], |r| {
        r.get(0)
    })
    .map_err(db_query_failed)
}

fn sessions_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT id, date, part, number, name FROM sessions ORDER BY number")
        .map_err(db_query_failed)?;
    let sessions = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "date": r.get::<_, String>(1)?,
                "part": r.get::<_, i64>(2)?,
                "number": r.get::<_, i64>(3)?,
                "name": r.get::<_, String>(4)?
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query_failed)?;
    Ok(json!({ "sessions": sessions }))
}

fn sessions_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(bad_params("name must not be empty"));
    }
    let date = match get_optional_str(params, "date") {
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map_err(|_| bad_params("date must be RFC 3339"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let settings = db::load_settings(conn).map_err(db_query_failed)?;
    let last_number = highest_session_number(conn)?;
    // Number and part come from the lifecycle rule; the UI owns the cap on
    // creating past totalSessions (see sessions.nextInfo).
    let slot = calc::next_session_slot(last_number, settings.first_part_sessions);

    let session_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO sessions(id, date, part, number, name) VALUES(?, ?, ?, ?, ?)",
        (
            &session_id,
            date.to_rfc3339_opts(SecondsFormat::Secs, true),
            slot.part,
            slot.number,
            &name,
        ),
    )
    .map_err(db_update_failed)?;

    Ok(json!({
        "sessionId": session_id,
        "number": slot.number,
        "part": slot.part
    }))
}

fn sessions_next_info(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let settings = db::load_settings(conn).map_err(db_query_failed)?;
    let last_number = highest_session_number(conn)?;
    let slot = calc::next_session_slot(last_number, settings.first_part_sessions);
    Ok(json!({
        "number": slot.number,
        "part": slot.part,
        "atCapacity": session_count(conn)? >= settings.total_sessions
    }))
}

fn sessions_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;

    let exists = conn
        .query_row("SELECT 1 FROM sessions WHERE id = ?", [&session_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()
        .map_err(db_query_failed)?
        .is_some();
    if !exists {
        return Err(not_found("session not found"));
    }

    // Surviving numbers stay sparse; a deleted session's number is not
    // recycled.
    let tx = conn.unchecked_transaction().map_err(db_tx_failed)?;
    tx.execute(
        "DELETE FROM attendance_records WHERE session_id = ?",
        [&session_id],
    )
    .map_err(db_delete_failed)?;
    tx.execute("DELETE FROM sessions WHERE id = ?", [&session_id])
        .map_err(db_delete_failed)?;
    tx.commit().map_err(db_commit_failed)?;

    Ok(json!({ "ok": true }))
}

fn handle_sessions_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match sessions_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_sessions_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match sessions_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_sessions_next_info(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match sessions_next_info(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_sessions_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match sessions_delete(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sessions.list" => Some(handle_sessions_list(state, req)),
        "sessions.create" => Some(handle_sessions_create(state, req)),
        "sessions.nextInfo" => Some(handle_sessions_next_info(state, req)),
        "sessions.delete" => Some(handle_sessions_delete(state, req)),
        _ => None,
    }
}
