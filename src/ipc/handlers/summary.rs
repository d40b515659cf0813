use crate::calc::{self, CountingMethod};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_query_failed, load_marks, load_sessions, load_students, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn parse_counting_method(params: &serde_json::Value) -> Result<CountingMethod, HandlerErr> {
    // Default is allSessions: an unmarked session counts as an absence. See
    // DESIGN.md for the pinned denominator policy.
    let Some(raw) = params.get("countingMethod") else {
        return Ok(CountingMethod::AllSessions);
    };
    raw.as_str()
        .and_then(CountingMethod::parse)
        .ok_or_else(|| bad_params("countingMethod must be allSessions or markedOnly"))
}

fn attendance_summary(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let method = parse_counting_method(params)?;
    let settings = db::load_settings(conn).map_err(db_query_failed)?;
    let students = load_students(conn)?;
    let sessions = load_sessions(conn)?;
    let marks = load_marks(conn)?;

    let per_student: Vec<serde_json::Value> = students
        .iter()
        .map(|student| {
            let part1 = calc::part_standing(&student.id, 1, &sessions, &marks, method);
            let part2 = calc::part_standing(&student.id, 2, &sessions, &marks, method);
            let at_risk = calc::is_at_risk(
                &student.id,
                &sessions,
                &marks,
                settings.attendance_threshold,
                method,
            );
            json!({
                "studentId": student.id,
                "name": student.name,
                "part1": part1,
                "part2": part2,
                "atRisk": at_risk
            })
        })
        .collect();

    Ok(json!({
        "threshold": settings.attendance_threshold,
        "perStudent": per_student
    }))
}

fn handle_attendance_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_summary(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calc.attendanceSummary" => Some(handle_attendance_summary(state, req)),
        _ => None,
    }
}
