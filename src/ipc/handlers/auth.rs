use crate::ipc::helpers::{get_optional_str, get_required_str, respond, session_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::session::route_roles;
use serde_json::json;

const DEMO_STUDENTS: [&str; 3] = ["std001", "std002", "std003"];
const DEMO_TEACHERS: [&str; 3] = ["tch001", "tch002", "tch006"];

fn parse_role(params: &serde_json::Value) -> Result<Role, HandlerErr> {
    match get_optional_str(params, "role") {
        None => Ok(Role::Student),
        Some(raw) => Role::parse(&raw).ok_or_else(|| {
            HandlerErr::new("bad_params", "role must be student or teacher")
                .with_details(json!({ "role": raw }))
        }),
    }
}

fn id_label(role: Role) -> &'static str {
    match role {
        Role::Student => "roll number",
        Role::Teacher => "teacher ID",
    }
}

fn auth_login(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let role = parse_role(params)?;
    let name = get_optional_str(params, "name").unwrap_or_default();
    let id = get_optional_str(params, "id").unwrap_or_default();
    if name.is_empty() || id.is_empty() {
        return Err(HandlerErr::new("bad_params", "Please enter both name and ID"));
    }

    let accepted = state.session.login(
        &state.seed.roster,
        state.store.as_mut(),
        &name,
        &id,
        role,
    )?;
    if !accepted {
        return Err(HandlerErr::new(
            "invalid_credentials",
            format!(
                "Invalid credentials. Please check your name and {}.",
                id_label(role)
            ),
        ));
    }
    Ok(session_json(&state.session))
}

fn auth_logout(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    state.session.logout(state.store.as_mut())?;
    tracing::info!("logged out");
    Ok(session_json(&state.session))
}

fn auth_demo_credentials(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let roster = &state.seed.roster;
    let students: Vec<serde_json::Value> = DEMO_STUDENTS
        .iter()
        .filter_map(|id| roster.student(id))
        .map(|s| json!({ "name": s.name, "id": s.roll_number, "role": Role::Student }))
        .collect();
    let teachers: Vec<serde_json::Value> = DEMO_TEACHERS
        .iter()
        .filter_map(|id| roster.teacher(id))
        .map(|t| json!({ "name": t.name, "id": t.teacher_id, "role": Role::Teacher }))
        .collect();

    if get_optional_str(params, "role").is_none() {
        return Ok(json!({ "student": students, "teacher": teachers }));
    }
    Ok(match parse_role(params)? {
        Role::Student => json!({ "student": students }),
        Role::Teacher => json!({ "teacher": teachers }),
    })
}

fn routes_check(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let path = get_required_str(params, "path")?;
    Ok(json!({
        "path": path,
        "access": state.session.route_access(&path),
        "allowedRoles": route_roles(&path).unwrap_or_default(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.login" => auth_login(state, &req.params),
        "auth.logout" => auth_logout(state),
        "auth.session" => Ok(session_json(&state.session)),
        "auth.demoCredentials" => auth_demo_credentials(state, &req.params),
        "routes.check" => routes_check(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
