use crate::ipc::helpers::{get_optional_str, get_required_str, parse_date, require_user, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{User, Weekday, WeeklyTimetable};
use crate::timetable::parse_clock;
use serde_json::json;

/// The week as the caller sees it. With `mine`, teachers only keep their own subjects.
fn visible_week(state: &AppState, params: &serde_json::Value) -> Result<WeeklyTimetable, HandlerErr> {
    let user = require_user(state)?;
    let mine = params.get("mine").and_then(|v| v.as_bool()).unwrap_or(false);
    Ok(match &user {
        User::Teacher(t) if mine => state.seed.timetable.restricted_to(&t.subjects),
        _ => state.seed.timetable.clone(),
    })
}

fn timetable_week(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let week = visible_week(state, params)?;
    Ok(json!({
        "days": week,
        "counts": week.slot_counts(),
    }))
}

fn timetable_day(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let week = visible_week(state, params)?;
    let raw = get_required_str(params, "day")?;
    let day = Weekday::parse(&raw).ok_or_else(|| {
        HandlerErr::new("bad_params", "day must be Monday through Friday").with_details(json!({ "day": raw }))
    })?;
    Ok(json!({
        "day": day,
        "slots": week.day(day),
        "previous": day.previous(),
        "next": day.next(),
    }))
}

fn timetable_today(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let week = visible_week(state, params)?;
    let date = match get_optional_str(params, "date") {
        Some(raw) => parse_date(&raw)?,
        None => state.config.today(),
    };
    let now = match get_optional_str(params, "time") {
        Some(raw) => parse_clock(&raw).ok_or_else(|| {
            HandlerErr::new("bad_params", "time must be HH:MM").with_details(json!({ "time": raw }))
        })?,
        None => chrono::Local::now().time(),
    };

    let date_str = date.format("%Y-%m-%d").to_string();
    let Some(day) = Weekday::from_date(date) else {
        return Ok(json!({
            "date": date_str,
            "day": null,
            "slots": [],
            "nextClass": null,
        }));
    };
    Ok(json!({
        "date": date_str,
        "day": day,
        "slots": week.day(day),
        "nextClass": week.next_class(day, now),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "timetable.week" => timetable_week(state, &req.params),
        "timetable.day" => timetable_day(state, &req.params),
        "timetable.today" => timetable_today(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
