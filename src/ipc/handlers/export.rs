use crate::export;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_required_str, load_marks, load_sessions, load_students, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;

fn build_table(conn: &Connection) -> Result<export::AttendanceTable, HandlerErr> {
    let students = load_students(conn)?;
    let sessions = load_sessions(conn)?;
    let marks = load_marks(conn)?;
    Ok(export::attendance_table(&students, &sessions, &marks))
}

fn export_table(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let table = build_table(conn)?;
    Ok(json!({ "header": table.header, "rows": table.rows }))
}

fn export_csv(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);
    let table = build_table(conn)?;
    let csv = export::to_csv(&table);
    std::fs::write(&out_path, csv).map_err(|e| HandlerErr {
        code: "io_failed",
        message: e.to_string(),
        details: Some(json!({ "outPath": out_path.to_string_lossy() })),
    })?;
    Ok(json!({
        "outPath": out_path.to_string_lossy(),
        "rowCount": table.rows.len()
    }))
}

fn handle_export_table(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match export_table(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match export_csv(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.table" => Some(handle_export_table(state, req)),
        "export.csv" => Some(handle_export_csv(state, req)),
        _ => None,
    }
}
