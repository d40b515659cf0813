use serde::Serialize;
use std::collections::HashMap;

/// Closed mark vocabulary. A justified absence always carries the
/// justification text; an empty one is rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Justified { justification: String },
}

impl AttendanceStatus {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Justified { .. } => "justified",
        }
    }

    pub fn justification(&self) -> Option<&str> {
        match self {
            Self::Justified { justification } => Some(justification),
            _ => None,
        }
    }

    pub fn from_parts(status: &str, justification: Option<&str>) -> Result<Self, String> {
        match status {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "justified" => {
                let text = justification.map(str::trim).unwrap_or("");
                if text.is_empty() {
                    return Err("justified status requires a non-empty justification".to_string());
                }
                Ok(Self::Justified {
                    justification: text.to_string(),
                })
            }
            other => Err(format!("unknown status: {}", other)),
        }
    }

    /// Present and justified both count toward the attendance numerator.
    pub fn counts_as_attended(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Denominator policy for the per-part percentage. `AllSessions` treats an
/// unmarked session as an absence; `MarkedOnly` excludes unmarked sessions
/// from the calculation entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountingMethod {
    AllSessions,
    MarkedOnly,
}

impl CountingMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "allSessions" => Some(Self::AllSessions),
            "markedOnly" => Some(Self::MarkedOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionRef {
    pub id: String,
    pub part: i64,
    pub number: i64,
}

/// Attendance marks keyed by (student_id, session_id). At most one mark
/// exists per pair; the store enforces that with its primary key.
pub type MarkMap = HashMap<(String, String), AttendanceStatus>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSlot {
    pub number: i64,
    pub part: i64,
}

/// Slot the next created session would occupy. `last_number` is the highest
/// number ever assigned (0 when none), so a deleted session's number is
/// never handed out again. Deliberately no cap check: the boundary decides
/// whether creation past the configured total is allowed, the rule itself
/// only numbers and splits.
pub fn next_session_slot(last_number: i64, first_part_sessions: i64) -> SessionSlot {
    let number = last_number + 1;
    let part = if number <= first_part_sessions { 1 } else { 2 };
    SessionSlot { number, part }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartStanding {
    pub percentage: i64,
    pub attended_count: i64,
    pub marked_count: i64,
    pub session_count: i64,
}

pub fn part_standing(
    student_id: &str,
    part: i64,
    sessions: &[SessionRef],
    marks: &MarkMap,
    method: CountingMethod,
) -> PartStanding {
    let mut session_count = 0_i64;
    let mut marked_count = 0_i64;
    let mut attended_count = 0_i64;

    for session in sessions.iter().filter(|s| s.part == part) {
        session_count += 1;
        let Some(status) = marks.get(&(student_id.to_string(), session.id.clone())) else {
            continue;
        };
        marked_count += 1;
        if status.counts_as_attended() {
            attended_count += 1;
        }
    }

    let denominator = match method {
        CountingMethod::AllSessions => session_count,
        CountingMethod::MarkedOnly => marked_count,
    };
    let percentage = if denominator > 0 {
        (100.0 * attended_count as f64 / denominator as f64).round() as i64
    } else {
        0
    };

    PartStanding {
        percentage,
        attended_count,
        marked_count,
        session_count,
    }
}

pub fn part_percentage(
    student_id: &str,
    part: i64,
    sessions: &[SessionRef],
    marks: &MarkMap,
    method: CountingMethod,
) -> i64 {
    part_standing(student_id, part, sessions, marks, method).percentage
}

/// A student is at risk when any part that has at least one session falls
/// below the threshold. A part with no sessions never triggers the flag.
pub fn is_at_risk(
    student_id: &str,
    sessions: &[SessionRef],
    marks: &MarkMap,
    threshold: i64,
    method: CountingMethod,
) -> bool {
    [1, 2].iter().any(|&part| {
        sessions.iter().any(|s| s.part == part)
            && part_percentage(student_id, part, sessions, marks, method) < threshold
    })
}
