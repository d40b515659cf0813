use crate::db::{self, Settings};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{bad_params, db_query_failed, db_update_failed, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn settings_json(s: Settings) -> serde_json::Value {
    json!({
        "totalSessions": s.total_sessions,
        "firstPartSessions": s.first_part_sessions,
        "attendanceThreshold": s.attendance_threshold
    })
}

fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| bad_params(format!("{} must be an integer", key)))
}

fn validate(settings: &Settings) -> Result<(), HandlerErr> {
    if settings.total_sessions <= 0 {
        return Err(bad_params("totalSessions must be positive"));
    }
    if settings.first_part_sessions <= 0 {
        return Err(bad_params("firstPartSessions must be positive"));
    }
    if settings.first_part_sessions > settings.total_sessions {
        return Err(bad_params(
            "firstPartSessions must not exceed totalSessions",
        ));
    }
    if !(0..=100).contains(&settings.attendance_threshold) {
        return Err(bad_params("attendanceThreshold must be in 0..=100"));
    }
    Ok(())
}

fn settings_get(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let settings = db::load_settings(conn).map_err(db_query_failed)?;
    Ok(json!({ "settings": settings_json(settings) }))
}

fn settings_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let settings = Settings {
        total_sessions: get_required_i64(params, "totalSessions")?,
        first_part_sessions: get_required_i64(params, "firstPartSessions")?,
        attendance_threshold: get_required_i64(params, "attendanceThreshold")?,
    };
    validate(&settings)?;
    db::store_settings(conn, settings).map_err(db_update_failed)?;
    Ok(json!({ "settings": settings_json(settings) }))
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match settings_get(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match settings_update(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.update" => Some(handle_settings_update(state, req)),
        _ => None,
    }
}
