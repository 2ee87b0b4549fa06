use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::AppState;
use crate::model::{AttendanceRecord, Role, Teacher, User};
use crate::session::{routes_for, AccessError, Session, SessionState};
use crate::store::StoreError;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "store write failed");
        HandlerErr::new("store_failed", e.to_string())
    }
}

impl From<AccessError> for HandlerErr {
    fn from(e: AccessError) -> Self {
        match &e {
            AccessError::Unauthenticated => HandlerErr::new("unauthenticated", e.to_string()),
            AccessError::Forbidden { role, allowed } => HandlerErr::new("forbidden", e.to_string())
                .with_details(json!({ "role": role, "allowedRoles": allowed })),
        }
    }
}

pub fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(value) => ok(id, value),
        Err(error) => error.response(id),
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing params.{}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Decode the whole params object; a missing params object reads as `{}`.
pub fn parse_params<T: DeserializeOwned>(params: &serde_json::Value) -> Result<T, HandlerErr> {
    let value = if params.is_null() {
        json!({})
    } else {
        params.clone()
    };
    serde_json::from_value(value).map_err(|e| HandlerErr::new("bad_params", e.to_string()))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        HandlerErr::new("bad_params", "date must be YYYY-MM-DD").with_details(json!({ "date": raw }))
    })
}

pub fn require_user(state: &AppState) -> Result<User, HandlerErr> {
    Ok(state
        .session
        .authorize(&[Role::Student, Role::Teacher])?
        .clone())
}

pub fn require_teacher(state: &AppState) -> Result<Teacher, HandlerErr> {
    match state.session.authorize(&[Role::Teacher])? {
        User::Teacher(t) => Ok(t.clone()),
        User::Student(_) => Err(AccessError::Forbidden {
            role: Role::Student,
            allowed: vec![Role::Teacher],
        }
        .into()),
    }
}

/// Records the caller may see. Students only ever get their own; teachers get
/// their classes and subjects, optionally narrowed to one student.
pub fn scoped_records(
    state: &AppState,
    user: &User,
    student_id: Option<&str>,
) -> Result<Vec<AttendanceRecord>, HandlerErr> {
    let roster = &state.seed.roster;
    match user {
        User::Student(s) => Ok(state.ledger.for_student(&s.id).into_iter().cloned().collect()),
        User::Teacher(t) => {
            if let Some(sid) = student_id {
                let student = roster
                    .student(sid)
                    .ok_or_else(|| HandlerErr::new("not_found", format!("no student {}", sid)))?;
                if !t.teaches_class(&student.class_label()) {
                    return Err(HandlerErr::new("forbidden", "student is not in one of your classes")
                        .with_details(json!({ "studentId": sid })));
                }
            }
            Ok(calc::teacher_records(t, roster, state.ledger.records())
                .into_iter()
                .filter(|r| student_id.map(|sid| r.student_id.as_deref() == Some(sid)).unwrap_or(true))
                .cloned()
                .collect())
        }
    }
}

pub fn session_json(session: &Session) -> serde_json::Value {
    match session.state() {
        SessionState::Loading => json!({ "state": "loading" }),
        SessionState::Unauthenticated => json!({ "state": "unauthenticated" }),
        SessionState::Authenticated { user, role } => json!({
            "state": "authenticated",
            "user": user,
            "role": role,
            "routes": routes_for(*role),
        }),
    }
}
