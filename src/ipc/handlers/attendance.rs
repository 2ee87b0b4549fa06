use crate::calc;
use crate::filter::RecordFilter;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, parse_date, parse_params, require_teacher, require_user, respond,
    scoped_records, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{NewRecord, RecordPatch};
use crate::model::{AttendanceRecord, AttendanceStatus, Teacher, User};
use crate::timetable::parse_clock;
use serde::Deserialize;
use serde_json::json;

fn check_time_slot(raw: &str) -> Result<(), HandlerErr> {
    let valid = raw
        .split_once('-')
        .map(|(a, b)| parse_clock(a).is_some() && parse_clock(b).is_some())
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(HandlerErr::new("bad_params", "timeSlot must be HH:MM-HH:MM")
            .with_details(json!({ "timeSlot": raw })))
    }
}

/// The teacher must teach both the subject and the student's class.
fn check_markable(state: &AppState, teacher: &Teacher, student_id: &str, subject_id: &str) -> Result<(), HandlerErr> {
    let roster = &state.seed.roster;
    let student = roster
        .student(student_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("no student {}", student_id)))?;
    if roster.subject(subject_id).is_none() {
        return Err(HandlerErr::new("not_found", format!("no subject {}", subject_id)));
    }
    if !teacher.teaches_subject(subject_id) || !teacher.teaches_class(&student.class_label()) {
        return Err(HandlerErr::new("forbidden", "you do not teach this student and subject")
            .with_details(json!({ "studentId": student_id, "subjectId": subject_id })));
    }
    Ok(())
}

/// Looks up a stored record the teacher may change.
fn owned_record(state: &AppState, teacher: &Teacher, id: &str) -> Result<AttendanceRecord, HandlerErr> {
    let record = state
        .ledger
        .get(id)
        .cloned()
        .ok_or_else(|| HandlerErr::new("not_found", format!("no attendance record {}", id)))?;
    if !calc::teacher_covers(teacher, &state.seed.roster, &record) {
        return Err(HandlerErr::new("forbidden", "you do not teach this student and subject")
            .with_details(json!({ "id": id })));
    }
    Ok(record)
}

fn validate_new(state: &AppState, teacher: &Teacher, rec: &mut NewRecord) -> Result<(), HandlerErr> {
    parse_date(&rec.date)?;
    check_time_slot(&rec.time_slot)?;
    check_markable(state, teacher, &rec.student_id, &rec.subject_id)?;
    if rec.marked_by.is_none() {
        rec.marked_by = Some(teacher.id.clone());
    }
    Ok(())
}

fn attendance_mark(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher = require_teacher(state)?;
    let mut rec: NewRecord = parse_params(params)?;
    validate_new(state, &teacher, &mut rec)?;
    let saved = state.ledger.mark(state.store.as_mut(), rec)?;
    Ok(json!({ "record": saved }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentMark {
    student_id: String,
    status: AttendanceStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkManyParams {
    date: String,
    subject_id: String,
    time_slot: String,
    marks: Vec<StudentMark>,
}

/// One class sitting at a time: date, subject and slot shared by every mark.
fn attendance_mark_many(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher = require_teacher(state)?;
    let p: MarkManyParams = parse_params(params)?;
    if p.marks.is_empty() {
        return Err(HandlerErr::new("bad_params", "marks must not be empty"));
    }

    let mut batch = Vec::with_capacity(p.marks.len());
    for m in p.marks {
        let mut rec = NewRecord {
            student_id: m.student_id,
            subject_id: p.subject_id.clone(),
            date: p.date.clone(),
            status: m.status,
            time_slot: p.time_slot.clone(),
            marked_by: None,
            marked_at: None,
        };
        validate_new(state, &teacher, &mut rec)?;
        batch.push(rec);
    }

    let saved = state.ledger.mark_many(state.store.as_mut(), batch)?;
    Ok(json!({ "saved": saved.len(), "records": saved }))
}

fn attendance_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user = require_user(state)?;
    let mut filter: RecordFilter = parse_params(params)?;
    let records: Vec<AttendanceRecord> = match &user {
        User::Student(s) => {
            filter.student_id = Some(s.id.clone());
            state.ledger.filter(&filter, &state.seed.roster).into_iter().cloned().collect()
        }
        User::Teacher(_) => {
            let scoped = scoped_records(state, &user, None)?;
            filter.apply(&scoped, &state.seed.roster).into_iter().cloned().collect()
        }
    };
    Ok(json!({ "records": records, "total": records.len() }))
}

fn attendance_session(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher = require_teacher(state)?;
    let date = get_required_str(params, "date")?;
    parse_date(&date)?;
    let subject_id = get_optional_str(params, "subjectId");
    let time_slot = get_optional_str(params, "timeSlot");
    if let Some(slot) = &time_slot {
        check_time_slot(slot)?;
    }
    if let Some(sid) = &subject_id {
        if !teacher.teaches_subject(sid) {
            return Err(HandlerErr::new("forbidden", "you do not teach this subject")
                .with_details(json!({ "subjectId": sid })));
        }
    }

    let roster = &state.seed.roster;
    let records: Vec<&AttendanceRecord> = state
        .ledger
        .for_session(&date, subject_id.as_deref(), time_slot.as_deref())
        .into_iter()
        .filter(|r| calc::teacher_covers(&teacher, roster, r))
        .collect();
    let students: Vec<_> = roster.students_in_classes(&teacher).collect();
    Ok(json!({
        "date": date,
        "records": records,
        "students": students,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    id: String,
    #[serde(flatten)]
    patch: RecordPatch,
}

fn attendance_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher = require_teacher(state)?;
    let p: UpdateParams = parse_params(params)?;
    if p.patch.is_empty() {
        return Err(HandlerErr::new("bad_params", "nothing to update"));
    }
    let current = owned_record(state, &teacher, &p.id)?;
    if let Some(date) = &p.patch.date {
        parse_date(date)?;
    }
    if let Some(slot) = &p.patch.time_slot {
        check_time_slot(slot)?;
    }
    if let Some(subject_id) = &p.patch.subject_id {
        let student_id = current.student_id.as_deref().unwrap_or_default();
        check_markable(state, &teacher, student_id, subject_id)?;
    }

    match state.ledger.update(state.store.as_mut(), &p.id, &p.patch)? {
        Some(record) => Ok(json!({ "record": record })),
        None => Err(HandlerErr::new("not_found", format!("no attendance record {}", p.id))),
    }
}

fn attendance_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher = require_teacher(state)?;
    let id = get_required_str(params, "id")?;
    owned_record(state, &teacher, &id)?;
    if !state.ledger.delete(state.store.as_mut(), &id)? {
        return Err(HandlerErr::new("not_found", format!("no attendance record {}", id)));
    }
    Ok(json!({ "deleted": id }))
}

fn attendance_day(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user = require_user(state)?;
    let date = get_required_str(params, "date")?;
    parse_date(&date)?;
    let student_id = get_optional_str(params, "studentId");
    let scoped = scoped_records(state, &user, student_id.as_deref())?;
    Ok(json!(calc::day_summary(&date, &scoped)))
}

fn attendance_recent(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user = require_user(state)?;
    let days = match params.get("days") {
        None | Some(serde_json::Value::Null) => state.config.recent_days,
        Some(v) => v
            .as_u64()
            .filter(|d| (1..=366).contains(d))
            .map(|d| d as usize)
            .ok_or_else(|| HandlerErr::new("bad_params", "days must be between 1 and 366"))?,
    };
    let anchor = match get_optional_str(params, "anchor") {
        Some(raw) => parse_date(&raw)?,
        None => state.config.today(),
    };
    let student_id = get_optional_str(params, "studentId");
    let scoped = scoped_records(state, &user, student_id.as_deref())?;
    Ok(json!({
        "anchor": anchor.format("%Y-%m-%d").to_string(),
        "days": calc::recent_days(anchor, days, &scoped),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.mark" => attendance_mark(state, &req.params),
        "attendance.markMany" => attendance_mark_many(state, &req.params),
        "attendance.list" => attendance_list(state, &req.params),
        "attendance.session" => attendance_session(state, &req.params),
        "attendance.update" => attendance_update(state, &req.params),
        "attendance.delete" => attendance_delete(state, &req.params),
        "attendance.day" => attendance_day(state, &req.params),
        "attendance.recent" => attendance_recent(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
