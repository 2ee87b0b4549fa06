//! Session and role store.
//!
//! The session is explicit state owned by the daemon and handed to whoever
//! needs it; persistence goes through a `KeyValueStore` passed in per call.
//! There is no token, hashing or expiry: a session is "who logged in last".

use crate::model::{Role, User};
use crate::roster::Roster;
use crate::store::{put_json, KeyValueStore, StoreError, ROLE_KEY, USER_KEY};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    Authenticated { user: User, role: Role },
    Unauthenticated,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AccessError {
    #[error("log in first")]
    Unauthenticated,
    #[error("this is only available for {} accounts", join_roles(.allowed))]
    Forbidden { role: Role, allowed: Vec<Role> },
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(" and ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteAccess {
    Allowed,
    Denied,
    Unauthenticated,
    NotFound,
}

const STUDENT_ROUTES: [&str; 4] = ["/", "/subject-wise", "/day-wise", "/timetable"];
const TEACHER_ROUTES: [&str; 5] = ["/", "/students", "/attendance", "/reports", "/timetable"];

/// Roles allowed on a route, or `None` for an unknown path.
pub fn route_roles(path: &str) -> Option<Vec<Role>> {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };
    let mut roles = Vec::new();
    if STUDENT_ROUTES.contains(&path) {
        roles.push(Role::Student);
    }
    if TEACHER_ROUTES.contains(&path) {
        roles.push(Role::Teacher);
    }
    if roles.is_empty() {
        None
    } else {
        Some(roles)
    }
}

pub fn routes_for(role: Role) -> &'static [&'static str] {
    match role {
        Role::Student => &STUDENT_ROUTES,
        Role::Teacher => &TEACHER_ROUTES,
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Loading,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Re-read a previously saved session. Anything unreadable counts as
    /// logged out and the stale keys are cleared.
    pub fn restore(&mut self, store: &mut dyn KeyValueStore) {
        self.state = match read_saved(store) {
            Ok(Some((user, role))) => {
                info!(user = user.id(), role = role.as_str(), "session restored");
                SessionState::Authenticated { user, role }
            }
            Ok(None) => SessionState::Unauthenticated,
            Err(reason) => {
                warn!(%reason, "discarding saved session");
                let _ = store.remove(USER_KEY);
                let _ = store.remove(ROLE_KEY);
                SessionState::Unauthenticated
            }
        };
    }

    /// Returns `Ok(false)` for unknown credentials and leaves the session as it was.
    pub fn login(
        &mut self,
        roster: &Roster,
        store: &mut dyn KeyValueStore,
        name: &str,
        id: &str,
        role: Role,
    ) -> Result<bool, StoreError> {
        let (name, id) = (name.trim(), id.trim());
        if name.is_empty() || id.is_empty() {
            return Ok(false);
        }
        let found = match role {
            Role::Student => roster
                .find_student_by_credentials(name, id)
                .cloned()
                .map(User::Student),
            Role::Teacher => roster
                .find_teacher_by_credentials(name, id)
                .cloned()
                .map(User::Teacher),
        };
        let Some(user) = found else {
            info!(role = role.as_str(), "login rejected");
            return Ok(false);
        };

        // Role first; a failed user write puts the old role back.
        let previous_role = store.get(ROLE_KEY)?;
        store.set(ROLE_KEY, role.as_str())?;
        if let Err(e) = put_json(store, USER_KEY, &user) {
            let restored = match &previous_role {
                Some(prev) => store.set(ROLE_KEY, prev),
                None => store.remove(ROLE_KEY),
            };
            if let Err(undo) = restored {
                warn!(error = %undo, "failed to restore saved role");
            }
            return Err(e);
        }
        info!(user = user.id(), name = user.name(), role = user.role().as_str(), "logged in");
        self.state = SessionState::Authenticated { user, role };
        Ok(true)
    }

    pub fn logout(&mut self, store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
        self.state = SessionState::Unauthenticated;
        store.remove(USER_KEY)?;
        store.remove(ROLE_KEY)?;
        Ok(())
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            SessionState::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match &self.state {
            SessionState::Authenticated { role, .. } => Some(*role),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn authorize(&self, allowed: &[Role]) -> Result<&User, AccessError> {
        let (Some(user), Some(role)) = (self.user(), self.role()) else {
            return Err(AccessError::Unauthenticated);
        };
        if allowed.contains(&role) {
            Ok(user)
        } else {
            Err(AccessError::Forbidden {
                role,
                allowed: allowed.to_vec(),
            })
        }
    }

    pub fn route_access(&self, path: &str) -> RouteAccess {
        let Some(allowed) = route_roles(path) else {
            return RouteAccess::NotFound;
        };
        match self.authorize(&allowed) {
            Ok(_) => RouteAccess::Allowed,
            Err(AccessError::Unauthenticated) => RouteAccess::Unauthenticated,
            Err(AccessError::Forbidden { .. }) => RouteAccess::Denied,
        }
    }
}

fn read_saved(store: &dyn KeyValueStore) -> Result<Option<(User, Role)>, String> {
    let user_raw = store.get(USER_KEY).map_err(|e| e.to_string())?;
    let role_raw = store.get(ROLE_KEY).map_err(|e| e.to_string())?;
    let (Some(user_raw), Some(role_raw)) = (user_raw, role_raw) else {
        return Ok(None);
    };
    let role = Role::parse(&role_raw).ok_or_else(|| format!("unknown role {role_raw:?}"))?;
    let user = match role {
        Role::Student => serde_json::from_str(&user_raw).map(User::Student),
        Role::Teacher => serde_json::from_str(&user_raw).map(User::Teacher),
    }
    .map_err(|e| e.to_string())?;
    Ok(Some((user, role)))
}
