use crate::calc::{self, SubjectSort, StudentSort, StudentSummary};
use crate::filter::StudentQuery;
use crate::ipc::helpers::{get_optional_str, parse_params, require_teacher, require_user, respond, scoped_records, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceRecord, Subject, User};
use serde::Deserialize;
use serde_json::json;

fn stats_student(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user = require_user(state)?;
    let roster = &state.seed.roster;
    let student = match &user {
        User::Student(s) => s.clone(),
        User::Teacher(_) => {
            let Some(sid) = get_optional_str(params, "studentId") else {
                return Err(HandlerErr::new("bad_params", "missing params.studentId"));
            };
            // Scope check only; the stats themselves cover every subject.
            scoped_records(state, &user, Some(sid.as_str()))?;
            roster
                .student(&sid)
                .cloned()
                .ok_or_else(|| HandlerErr::new("not_found", format!("no student {}", sid)))?
        }
    };

    let stats = state.ledger.live_student_stats(&student, &roster.subjects);
    let thresholds = &state.config.thresholds;
    Ok(json!({
        "stats": stats,
        "band": thresholds.band(stats.percentage),
        "needsAttention": thresholds.needs_attention(stats.percentage),
        "goal": thresholds.excellent,
        "goalGap": thresholds.goal_gap(stats.percentage),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubjectsParams {
    student_id: Option<String>,
    subject_id: Option<String>,
    sort_by: SubjectSort,
}

fn stats_subjects(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user = require_user(state)?;
    let p: SubjectsParams = parse_params(params)?;
    let roster = &state.seed.roster;

    let scoped = scoped_records(state, &user, p.student_id.as_deref())?;
    let subjects: Vec<Subject> = match &user {
        User::Student(_) => roster.subjects.clone(),
        User::Teacher(t) => roster.teacher_subjects(t).cloned().collect(),
    };
    let subjects: Vec<Subject> = match p.subject_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() && !id.eq_ignore_ascii_case("all") => {
            subjects.into_iter().filter(|s| s.id == id).collect()
        }
        _ => subjects,
    };

    let refs: Vec<&AttendanceRecord> = scoped.iter().collect();
    let mut rows = calc::subject_stats(&subjects, &refs);
    calc::sort_subject_stats(&mut rows, p.sort_by);

    let thresholds = &state.config.thresholds;
    let rows: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|s| {
            let band = thresholds.band(s.percentage);
            let mut row = json!(s);
            row["band"] = json!(band);
            row
        })
        .collect();
    Ok(json!({ "subjects": rows }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TeacherParams {
    #[serde(flatten)]
    query: StudentQuery,
    sort_by: StudentSort,
}

fn stats_teacher(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher = require_teacher(state)?;
    let p: TeacherParams = parse_params(params)?;
    let roster = &state.seed.roster;
    let thresholds = &state.config.thresholds;

    let summary = calc::teacher_stats(&teacher, roster, state.ledger.records());
    let all: Vec<StudentSummary> = roster
        .students_in_classes(&teacher)
        .map(|s| StudentSummary::from_stats(&state.ledger.live_student_stats(s, &roster.subjects), thresholds))
        .collect();
    let classes = calc::class_summaries(&teacher.classes, &all, thresholds);

    let mut students: Vec<StudentSummary> = all
        .iter()
        .filter(|s| p.query.matches(&s.student))
        .cloned()
        .collect();
    calc::sort_students(&mut students, p.sort_by);

    Ok(json!({
        "stats": summary,
        "classes": classes,
        "students": students,
        "needsAttention": calc::needs_attention(&all, thresholds),
        "topPerformers": calc::top_performers(&all, thresholds),
    }))
}

/// Personal dashboard numbers: subject counters plus the journal of recent sittings.
fn stats_overview(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    require_user(state)?;
    let overview = calc::counter_overview(&state.seed.roster.subjects);
    let mut journal = state.seed.journal.clone();
    journal.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.time_slot.cmp(&b.time_slot)));
    Ok(json!({
        "overview": overview,
        "band": state.config.thresholds.band(overview.percentage),
        "journal": journal,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "stats.student" => stats_student(state, &req.params),
        "stats.subjects" => stats_subjects(state, &req.params),
        "stats.teacher" => stats_teacher(state, &req.params),
        "stats.overview" => stats_overview(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
