use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_asistenciad");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn asistenciad");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Two students x two sessions with one justified and one unmarked cell:
/// a header plus one row per student, unmarked rendered as "-".
#[test]
fn table_and_csv_agree_on_the_grid() {
    let workspace = temp_dir("asistencia-export-grid");
    let csv_out = workspace.join("asistencia.csv");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let ana = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "Ana" }),
    );
    let ana_id = ana.get("studentId").and_then(|v| v.as_str()).expect("id").to_string();
    let bruno = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "Bruno" }),
    );
    let bruno_id = bruno
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();

    let mut session_ids = Vec::new();
    for i in 1..=2 {
        let s = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "sessions.create",
            json!({ "name": format!("Encuentro {}", i) }),
        );
        session_ids.push(
            s.get("sessionId")
                .and_then(|v| v.as_str())
                .expect("sessionId")
                .to_string(),
        );
    }

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "m1",
        "attendance.mark",
        json!({ "studentId": ana_id, "sessionId": session_ids[0], "status": "present" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "m2",
        "attendance.mark",
        json!({
            "studentId": ana_id,
            "sessionId": session_ids[1],
            "status": "justified",
            "justification": "viaje"
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "m3",
        "attendance.mark",
        json!({ "studentId": bruno_id, "sessionId": session_ids[0], "status": "absent" }),
    );
    // Bruno's second session stays unmarked.

    let table = request_ok(&mut stdin, &mut reader, "t", "export.table", json!({}));
    let header: Vec<&str> = table
        .get("header")
        .and_then(|v| v.as_array())
        .expect("header")
        .iter()
        .map(|v| v.as_str().expect("header cell"))
        .collect();
    assert_eq!(header, vec!["Estudiante", "Encuentro 1", "Encuentro 2"]);

    let rows = table.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(rows.len(), 2);
    let row_strings: Vec<Vec<&str>> = rows
        .iter()
        .map(|row| {
            row.as_array()
                .expect("row array")
                .iter()
                .map(|v| v.as_str().expect("cell"))
                .collect()
        })
        .collect();
    assert_eq!(row_strings[0], vec!["Ana", "Presente", "Justificado"]);
    assert_eq!(row_strings[1], vec!["Bruno", "Ausente", "-"]);

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "e",
        "export.csv",
        json!({ "outPath": csv_out.to_string_lossy() }),
    );
    assert_eq!(exported.get("rowCount").and_then(|v| v.as_i64()), Some(2));

    let csv = std::fs::read_to_string(&csv_out).expect("read exported csv");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3, "1 header + 2 data rows");
    assert_eq!(lines[0], "Estudiante,Encuentro 1,Encuentro 2");
    assert_eq!(lines[1], "Ana,Presente,Justificado");
    assert_eq!(lines[2], "Bruno,Ausente,-");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn empty_roster_exports_just_the_header() {
    let workspace = temp_dir("asistencia-export-empty");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let table = request_ok(&mut stdin, &mut reader, "2", "export.table", json!({}));
    let header = table.get("header").and_then(|v| v.as_array()).expect("header");
    assert_eq!(header.len(), 1);
    assert_eq!(
        table.get("rows").and_then(|v| v.as_array()).map(|r| r.len()),
        Some(0)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn student_names_with_commas_survive_the_csv_round() {
    let workspace = temp_dir("asistencia-export-quote");
    let csv_out = workspace.join("quoted.csv");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "Pérez, Ana" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "export.csv",
        json!({ "outPath": csv_out.to_string_lossy() }),
    );

    let csv = std::fs::read_to_string(&csv_out).expect("read exported csv");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[1], "\"Pérez, Ana\"");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
