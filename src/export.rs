use serde::Serialize;

use crate::calc::{AttendanceStatus, MarkMap, SessionRef};

pub const STUDENT_COLUMN_LABEL: &str = "Estudiante";
pub const UNMARKED_CELL: &str = "-";

#[derive(Debug, Clone)]
pub struct StudentRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn status_cell(status: &AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::Present => "Presente",
        AttendanceStatus::Absent => "Ausente",
        AttendanceStatus::Justified { .. } => "Justificado",
    }
}

/// Flat table for the overview grid and the CSV export: one column per
/// session in ascending number order, one row per student in roster order.
/// Pure lookup over already-loaded data.
pub fn attendance_table(
    students: &[StudentRef],
    sessions: &[SessionRef],
    marks: &MarkMap,
) -> AttendanceTable {
    let mut ordered: Vec<&SessionRef> = sessions.iter().collect();
    ordered.sort_by_key(|s| s.number);

    let mut header = Vec::with_capacity(ordered.len() + 1);
    header.push(STUDENT_COLUMN_LABEL.to_string());
    for session in &ordered {
        header.push(format!("Encuentro {}", session.number));
    }

    let rows = students
        .iter()
        .map(|student| {
            let mut row = Vec::with_capacity(ordered.len() + 1);
            row.push(student.name.clone());
            for session in &ordered {
                let cell = marks
                    .get(&(student.id.clone(), session.id.clone()))
                    .map(status_cell)
                    .unwrap_or(UNMARKED_CELL);
                row.push(cell.to_string());
            }
            row
        })
        .collect();

    AttendanceTable { header, rows }
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn to_csv(table: &AttendanceTable) -> String {
    let mut out = String::new();
    for row in std::iter::once(&table.header).chain(table.rows.iter()) {
        let joined = row
            .iter()
            .map(|cell| csv_quote(cell))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&joined);
        out.push('\n');
    }
    out
}
