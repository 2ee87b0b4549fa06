pub mod attendance;
pub mod auth;
pub mod core;
pub mod roster;
pub mod stats;
pub mod timetable;
