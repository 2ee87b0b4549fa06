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
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> String {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn login_teacher(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, name: &str, id: &str) {
    let _ = request_ok(stdin, reader, "login", "auth.login", json!({
        "name": name,
        "id": id,
        "role": "teacher"
    }));
}

fn records_for(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    date: &str,
) -> Vec<serde_json::Value> {
    let listed = request_ok(stdin, reader, id, "attendance.list", json!({ "date": date }));
    listed["records"].as_array().cloned().unwrap_or_default()
}

#[test]
fn marking_the_same_sitting_twice_keeps_one_record() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    login_teacher(&mut stdin, &mut reader, "Dr. Sarah Wilson", "MATH001");

    let mark = |status: &str| {
        json!({
            "studentId": "std002",
            "subjectId": "1",
            "date": "2024-02-06",
            "timeSlot": "09:00-10:00",
            "status": status
        })
    };
    let first = request_ok(&mut stdin, &mut reader, "1", "attendance.mark", mark("absent"));
    let second = request_ok(&mut stdin, &mut reader, "2", "attendance.mark", mark("late"));
    assert_ne!(first["record"]["id"], second["record"]["id"]);
    assert!(second["record"]["markedAt"].is_string());

    let records = records_for(&mut stdin, &mut reader, "3", "2024-02-06");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "late");
    assert_eq!(records[0]["markedBy"], "tch001");

    // Another slot on the same day is another sitting.
    let mut other = mark("present");
    other["timeSlot"] = json!("10:00-11:00");
    request_ok(&mut stdin, &mut reader, "4", "attendance.mark", other);
    assert_eq!(records_for(&mut stdin, &mut reader, "5", "2024-02-06").len(), 2);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn mark_many_replaces_existing_and_persists_in_workspace() {
    let workspace = temp_dir("attendanced-mark-many");

    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        request_ok(&mut stdin, &mut reader, "ws", "workspace.select", json!({
            "path": workspace.to_string_lossy()
        }));
        login_teacher(&mut stdin, &mut reader, "Dr. Michael Kumar", "PRIN001");

        let sitting = json!({
            "date": "2024-02-07",
            "subjectId": "3",
            "timeSlot": "11:00-12:00",
        });
        let mut batch = sitting.clone();
        batch["marks"] = json!([
            { "studentId": "std001", "status": "present" },
            { "studentId": "std004", "status": "absent" },
            { "studentId": "std004", "status": "late" }
        ]);
        let saved = request_ok(&mut stdin, &mut reader, "1", "attendance.markMany", batch);
        assert_eq!(saved["saved"], 2);

        let mut again = sitting.clone();
        again["marks"] = json!([{ "studentId": "std001", "status": "absent" }]);
        request_ok(&mut stdin, &mut reader, "2", "attendance.markMany", again);

        let session = request_ok(&mut stdin, &mut reader, "3", "attendance.session", sitting);
        let records = session["records"].as_array().expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(session["students"].as_array().map(|s| s.len()), Some(15));

        let empty = request(&mut stdin, &mut reader, "4", "attendance.markMany", json!({
            "date": "2024-02-07",
            "subjectId": "3",
            "timeSlot": "11:00-12:00",
            "marks": []
        }));
        assert_eq!(error_code(&empty), "bad_params");

        drop(stdin);
        let _ = child.wait();
    }

    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        request_ok(&mut stdin, &mut reader, "ws", "workspace.select", json!({
            "path": workspace.to_string_lossy()
        }));
        // Restored session; no login needed.
        let records = records_for(&mut stdin, &mut reader, "1", "2024-02-07");
        assert_eq!(records.len(), 2);
        let std001 = records
            .iter()
            .find(|r| r["studentId"] == "std001")
            .expect("std001 record");
        assert_eq!(std001["status"], "absent");
        let std004 = records
            .iter()
            .find(|r| r["studentId"] == "std004")
            .expect("std004 record");
        assert_eq!(std004["status"], "late");
        drop(stdin);
        let _ = child.wait();
    }

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn marking_checks_subject_class_and_formats() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    login_teacher(&mut stdin, &mut reader, "Prof. David Martinez", "PHY001");

    let base = json!({
        "studentId": "std003",
        "subjectId": "2",
        "date": "2024-02-08",
        "timeSlot": "10:00-11:00",
        "status": "present"
    });

    let mut not_mine = base.clone();
    not_mine["subjectId"] = json!("1");
    let resp = request(&mut stdin, &mut reader, "1", "attendance.mark", not_mine);
    assert_eq!(error_code(&resp), "forbidden");

    let mut ghost = base.clone();
    ghost["studentId"] = json!("std999");
    let resp = request(&mut stdin, &mut reader, "2", "attendance.mark", ghost);
    assert_eq!(error_code(&resp), "not_found");

    let mut bad_date = base.clone();
    bad_date["date"] = json!("08/02/2024");
    let resp = request(&mut stdin, &mut reader, "3", "attendance.mark", bad_date);
    assert_eq!(error_code(&resp), "bad_params");

    let mut bad_status = base.clone();
    bad_status["status"] = json!("excused");
    let resp = request(&mut stdin, &mut reader, "4", "attendance.mark", bad_status);
    assert_eq!(error_code(&resp), "bad_params");

    let mut bad_slot = base.clone();
    bad_slot["timeSlot"] = json!("morning");
    let resp = request(&mut stdin, &mut reader, "5", "attendance.mark", bad_slot);
    assert_eq!(error_code(&resp), "bad_params");

    let ok = request_ok(&mut stdin, &mut reader, "6", "attendance.mark", base);
    let id = ok["record"]["id"].as_str().expect("id").to_string();

    let nothing = request(&mut stdin, &mut reader, "7", "attendance.update", json!({ "id": id }));
    assert_eq!(error_code(&nothing), "bad_params");
    let updated = request_ok(&mut stdin, &mut reader, "8", "attendance.update", json!({
        "id": id,
        "status": "absent",
        "timeSlot": "15:00-16:00"
    }));
    assert_eq!(updated["record"]["status"], "absent");
    assert_eq!(updated["record"]["timeSlot"], "15:00-16:00");

    let missing = request(&mut stdin, &mut reader, "9", "attendance.update", json!({
        "id": "no-such-record",
        "status": "late"
    }));
    assert_eq!(error_code(&missing), "not_found");

    request_ok(&mut stdin, &mut reader, "10", "attendance.delete", json!({ "id": id }));
    let gone = request(&mut stdin, &mut reader, "11", "attendance.delete", json!({ "id": id }));
    assert_eq!(error_code(&gone), "not_found");
    assert!(records_for(&mut stdin, &mut reader, "12", "2024-02-08").is_empty());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn students_only_see_their_own_records() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    login_teacher(&mut stdin, &mut reader, "Dr. Sarah Wilson", "MATH001");
    for (i, student) in ["std001", "std002"].iter().enumerate() {
        request_ok(&mut stdin, &mut reader, &format!("m{}", i), "attendance.mark", json!({
            "studentId": student,
            "subjectId": "1",
            "date": "2024-02-09",
            "timeSlot": "09:00-10:00",
            "status": "present"
        }));
    }
    request_ok(&mut stdin, &mut reader, "out", "auth.logout", json!({}));
    request_ok(&mut stdin, &mut reader, "in", "auth.login", json!({
        "name": "John Smith",
        "id": "CS2023001"
    }));

    // Asking for someone else's id is ignored.
    let listed = request_ok(&mut stdin, &mut reader, "1", "attendance.list", json!({
        "date": "2024-02-09",
        "studentId": "std002"
    }));
    let records = listed["records"].as_array().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["studentId"], "std001");

    let day = request_ok(&mut stdin, &mut reader, "2", "attendance.day", json!({ "date": "2024-02-09" }));
    assert_eq!(day["totalClasses"], 1);
    assert_eq!(day["percentage"], 100);

    let write = request(&mut stdin, &mut reader, "3", "attendance.delete", json!({ "id": "anything" }));
    assert_eq!(error_code(&write), "forbidden");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn teachers_only_reach_their_own_subjects() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    login_teacher(&mut stdin, &mut reader, "Prof. David Martinez", "PHY001");
    let physics = |slot: &str| {
        json!({
            "studentId": "std001",
            "subjectId": "2",
            "date": "2024-02-12",
            "timeSlot": slot,
            "status": "present"
        })
    };
    let first = request_ok(&mut stdin, &mut reader, "1", "attendance.mark", physics("10:00-11:00"));
    let first_id = first["record"]["id"].as_str().expect("id").to_string();
    let second = request_ok(&mut stdin, &mut reader, "2", "attendance.mark", physics("11:00-12:00"));
    let second_id = second["record"]["id"].as_str().expect("id").to_string();
    request_ok(&mut stdin, &mut reader, "3", "auth.logout", json!({}));

    login_teacher(&mut stdin, &mut reader, "Dr. Sarah Wilson", "MATH001");
    let session = request(&mut stdin, &mut reader, "4", "attendance.session", json!({
        "date": "2024-02-12",
        "subjectId": "2"
    }));
    assert_eq!(error_code(&session), "forbidden");

    let whole_day = request_ok(&mut stdin, &mut reader, "5", "attendance.session", json!({
        "date": "2024-02-12"
    }));
    let visible = whole_day["records"].as_array().expect("records");
    assert!(visible.iter().all(|r| r["subjectId"] == "1"), "{:?}", visible);

    let update = request(&mut stdin, &mut reader, "6", "attendance.update", json!({
        "id": first_id,
        "status": "absent"
    }));
    assert_eq!(error_code(&update), "forbidden");
    let delete = request(&mut stdin, &mut reader, "7", "attendance.delete", json!({ "id": first_id }));
    assert_eq!(error_code(&delete), "forbidden");

    // Moving one of their own records into a subject they do not teach is refused too.
    let maths = request_ok(&mut stdin, &mut reader, "8", "attendance.mark", json!({
        "studentId": "std001",
        "subjectId": "1",
        "date": "2024-02-12",
        "timeSlot": "09:00-10:00",
        "status": "present"
    }));
    let maths_id = maths["record"]["id"].as_str().expect("id").to_string();
    let moved = request(&mut stdin, &mut reader, "9", "attendance.update", json!({
        "id": maths_id,
        "subjectId": "2"
    }));
    assert_eq!(error_code(&moved), "forbidden");
    request_ok(&mut stdin, &mut reader, "10", "auth.logout", json!({}));

    login_teacher(&mut stdin, &mut reader, "Prof. David Martinez", "PHY001");
    let physics_records = |stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, id: &str| {
        records_for(stdin, reader, id, "2024-02-12")
            .into_iter()
            .filter(|r| r["subjectId"] == "2" && r["studentId"] == "std001")
            .collect::<Vec<_>>()
    };
    let untouched = physics_records(&mut stdin, &mut reader, "11");
    assert_eq!(untouched.len(), 2);
    assert!(untouched.iter().all(|r| r["status"] == "present"));

    // Moving a record onto an already marked sitting leaves one record for it.
    let collided = request_ok(&mut stdin, &mut reader, "12", "attendance.update", json!({
        "id": second_id,
        "timeSlot": "10:00-11:00",
        "status": "late"
    }));
    assert_eq!(collided["record"]["id"], second_id.as_str());
    let after = physics_records(&mut stdin, &mut reader, "13");
    assert_eq!(after.len(), 1);
    assert_eq!(after[0]["id"], second_id.as_str());
    assert_eq!(after[0]["timeSlot"], "10:00-11:00");
    assert_eq!(after[0]["status"], "late");

    drop(stdin);
    let _ = child.wait();
}
