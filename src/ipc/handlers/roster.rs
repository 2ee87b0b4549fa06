use crate::calc::{self, StudentSort, StudentSummary};
use crate::filter::StudentQuery;
use crate::ipc::helpers::{parse_params, require_teacher, require_user, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::User;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubjectsListParams {
    /// Teachers only: limit to subjects they teach.
    mine: bool,
}

fn subjects_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user = require_user(state)?;
    let p: SubjectsListParams = parse_params(params)?;
    let roster = &state.seed.roster;

    let rows: Vec<serde_json::Value> = roster
        .subjects
        .iter()
        .filter_map(|s| {
            let mine = match &user {
                User::Teacher(t) => t.teaches_subject(&s.id),
                User::Student(_) => true,
            };
            if p.mine && !mine {
                return None;
            }
            let mut row = json!(s);
            row["mine"] = json!(mine);
            Some(row)
        })
        .collect();
    Ok(json!({ "subjects": rows }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StudentsListParams {
    #[serde(flatten)]
    query: StudentQuery,
    sort_by: StudentSort,
}

fn students_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher = require_teacher(state)?;
    let p: StudentsListParams = parse_params(params)?;
    let roster = &state.seed.roster;
    let thresholds = &state.config.thresholds;

    let mut rows: Vec<StudentSummary> = roster
        .students_in_classes(&teacher)
        .filter(|s| p.query.matches(s))
        .map(|s| {
            let stats = state.ledger.live_student_stats(s, &roster.subjects);
            StudentSummary::from_stats(&stats, thresholds)
        })
        .collect();
    calc::sort_students(&mut rows, p.sort_by);

    Ok(json!({
        "students": rows,
        "total": rows.len(),
        "classes": teacher.classes,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "subjects.list" => subjects_list(state, &req.params),
        "students.list" => students_list(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
