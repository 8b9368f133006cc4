//! # Session / Auth Manager
//!
//! Employee directory, password checks and terminal sessions.
//!
//! ## Session State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   LoggedOut ──login(code, password, T)──► LoggedIn at T                │
//! │       ▲                                       │                         │
//! │       │                 record_activity() ────┤ (resets idle clock)     │
//! │       │                                       │                         │
//! │       ├──────────────── logout() ─────────────┤                         │
//! │       │                                       │                         │
//! │       └──── check_idle(): idle >= timeout ────┘                         │
//! │             "Session closed due to inactivity"                          │
//! │                                                                         │
//! │   login outcomes:                                                       │
//! │     Ok(true)   session opened                                           │
//! │     Ok(false)  unknown code or wrong password (no detail leaked)        │
//! │     Err(AccountInactive)                                                │
//! │     Err(ConcurrentSessionConflict { terminal_id })                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Password hashes never leave this module: other components only ever see
//! a [`UserView`].

use std::fmt;
use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordVerifier, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{AuthError, AuthResult, ValidationError};
use crate::types::Role;
use crate::validation::{validate_employee_code, validate_password};

/// Shown to the cashier when the idle watcher closes their session.
pub const INACTIVITY_NOTICE: &str = "Session closed due to inactivity";

// =============================================================================
// Settings
// =============================================================================

/// Tunables for the auth manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Seconds without activity before a session is closed.
    pub idle_timeout_secs: i64,
    /// Argon2 memory cost in KiB.
    pub hash_memory_kib: u32,
    /// Argon2 passes.
    pub hash_iterations: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            idle_timeout_secs: crate::DEFAULT_IDLE_TIMEOUT_SECS,
            hash_memory_kib: Params::DEFAULT_M_COST,
            hash_iterations: Params::DEFAULT_T_COST,
        }
    }
}

impl AuthSettings {
    /// Cheap hashing for seeding demo data and for tests.
    pub fn low_cost() -> Self {
        AuthSettings {
            hash_memory_kib: 1024,
            hash_iterations: 1,
            ..Default::default()
        }
    }

    pub fn with_idle_timeout(mut self, secs: i64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

// =============================================================================
// Users
// =============================================================================

/// A directory entry, including its password hash.
///
/// Fields are private on purpose: the record can be persisted through
/// [`AuthSnapshot`] but its hash cannot be read outside this module.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    id: String,
    code: String,
    name: String,
    role: Role,
    is_active: bool,
    password_hash: String,
    last_login: Option<DateTime<Utc>>,
    terminal_id: Option<String>,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("code", &self.code)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

impl UserRecord {
    fn view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            code: self.code.clone(),
            name: self.name.clone(),
            role: self.role,
            is_active: self.is_active,
            last_login: self.last_login,
            terminal_id: self.terminal_id.clone(),
        }
    }
}

/// What the rest of the terminal knows about an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserView {
    pub id: String,
    pub code: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    #[ts(as = "Option<String>")]
    pub last_login: Option<DateTime<Utc>>,
    pub terminal_id: Option<String>,
}

impl UserView {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Input for a new directory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    /// Fixed id (seed data) or `None` for a fresh UUID.
    pub id: Option<String>,
    pub code: String,
    pub name: String,
    pub role: Role,
    pub password: String,
}

// =============================================================================
// Sessions
// =============================================================================

/// One terminal's login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Session {
    pub terminal_id: String,
    pub employee_id: String,
    #[ts(as = "String")]
    pub start_time: DateTime<Utc>,
    #[ts(as = "String")]
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
}

impl Session {
    /// Whole seconds since the last recorded activity.
    pub fn idle_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_activity).num_seconds()
    }
}

/// Result of one idle poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleStatus {
    /// Nobody is logged in at this terminal.
    LoggedOut,
    /// Session still live.
    Active { seconds_left: i64 },
    /// Session was just closed; show [`INACTIVITY_NOTICE`].
    TimedOut {
        employee_id: String,
        terminal_id: String,
    },
}

impl IdleStatus {
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            IdleStatus::TimedOut { .. } => Some(INACTIVITY_NOTICE),
            _ => None,
        }
    }
}

/// Everything the auth manager persists into the `auth` blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub users: Vec<UserRecord>,
    pub sessions: Vec<Session>,
    pub current_user_id: Option<String>,
    pub current_terminal_id: Option<String>,
}

// =============================================================================
// Auth Manager
// =============================================================================

/// Directory plus session bookkeeping for one terminal process.
pub struct AuthManager {
    settings: AuthSettings,
    clock: Arc<dyn Clock>,
    users: Vec<UserRecord>,
    sessions: Vec<Session>,
    /// (employee id, terminal id) of whoever is logged in here.
    current: Option<(String, String)>,
}

impl fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthManager")
            .field("settings", &self.settings)
            .field("users", &self.users.len())
            .field("sessions", &self.sessions)
            .field("current", &self.current)
            .finish()
    }
}

impl AuthManager {
    pub fn new(settings: AuthSettings, clock: Arc<dyn Clock>) -> Self {
        AuthManager {
            settings,
            clock,
            users: Vec::new(),
            sessions: Vec::new(),
            current: None,
        }
    }

    pub fn settings(&self) -> AuthSettings {
        self.settings
    }

    // -------------------------------------------------------------------------
    // Login / Logout
    // -------------------------------------------------------------------------

    /// Authenticates `code`/`password` and opens a session at `terminal_id`.
    ///
    /// Wrong credentials return `Ok(false)`. Any earlier session row for the
    /// same terminal is dropped before the new one is opened, and a stale
    /// session of the same employee at another terminal is closed, so an
    /// employee never holds two active sessions.
    pub fn login(&mut self, code: &str, password: &str, terminal_id: &str) -> AuthResult<bool> {
        if terminal_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "terminal_id".to_string(),
            }
            .into());
        }

        let Some(user) = self.users.iter().find(|u| u.code == code.trim()) else {
            debug!(terminal_id, "Login rejected: unknown code");
            return Ok(false);
        };
        if !verify_password(password, &user.password_hash) {
            debug!(terminal_id, "Login rejected: bad password");
            return Ok(false);
        }
        if !user.is_active {
            warn!(user_id = %user.id, terminal_id, "Login rejected: account inactive");
            return Err(AuthError::AccountInactive);
        }

        let user_id = user.id.clone();
        if let Some(other) = self.active_terminal_elsewhere(&user_id, terminal_id) {
            warn!(user_id = %user_id, terminal_id, other_terminal = other, "Login rejected: active elsewhere");
            return Err(AuthError::ConcurrentSessionConflict {
                terminal_id: other.to_string(),
            });
        }

        let now = self.clock.now();
        self.sessions.retain(|s| s.terminal_id != terminal_id);
        // Whatever is still open elsewhere is stale; it is taken over.
        for stale in self
            .sessions
            .iter_mut()
            .filter(|s| s.employee_id == user_id && s.is_active)
        {
            stale.is_active = false;
            info!(user_id = %user_id, terminal_id, stale_terminal = %stale.terminal_id, "Stale session taken over");
        }
        self.sessions.push(Session {
            terminal_id: terminal_id.to_string(),
            employee_id: user_id.clone(),
            start_time: now,
            last_activity: now,
            is_active: true,
        });
        if let Some(user) = self.users.iter_mut().find(|u| u.id == user_id) {
            user.last_login = Some(now);
            user.terminal_id = Some(terminal_id.to_string());
        }
        self.current = Some((user_id.clone(), terminal_id.to_string()));

        info!(user_id = %user_id, terminal_id, "Employee logged in");
        Ok(true)
    }

    /// Closes the current terminal's session. No-op when logged out.
    pub fn logout(&mut self) {
        let Some((user_id, terminal_id)) = self.current.take() else {
            return;
        };
        for session in self
            .sessions
            .iter_mut()
            .filter(|s| s.terminal_id == terminal_id)
        {
            session.is_active = false;
        }
        info!(user_id = %user_id, terminal_id = %terminal_id, "Employee logged out");
    }

    /// Resets the idle clock of the current terminal's session.
    pub fn record_activity(&mut self) {
        let Some((_, terminal_id)) = &self.current else {
            return;
        };
        let now = self.clock.now();
        if let Some(session) = self
            .sessions
            .iter_mut()
            .find(|s| &s.terminal_id == terminal_id && s.is_active)
        {
            session.last_activity = now;
        }
    }

    /// Idle poll. Every stored session is evaluated; only the one bound to
    /// this terminal is ever closed.
    pub fn check_idle(&mut self) -> IdleStatus {
        let now = self.clock.now();
        let timeout = self.settings.idle_timeout_secs;

        for session in self.stale_sessions() {
            let here = self
                .current
                .as_ref()
                .map_or(false, |(_, t)| *t == session.terminal_id);
            if !here {
                debug!(
                    terminal_id = %session.terminal_id,
                    employee_id = %session.employee_id,
                    idle_secs = session.idle_secs(now),
                    "Stale session at another terminal"
                );
            }
        }

        let Some(session) = self.current_session() else {
            return IdleStatus::LoggedOut;
        };
        let idle = session.idle_secs(now);
        if idle < timeout {
            return IdleStatus::Active {
                seconds_left: timeout - idle,
            };
        }

        let employee_id = session.employee_id.clone();
        let terminal_id = session.terminal_id.clone();
        self.logout();
        warn!(employee_id = %employee_id, terminal_id = %terminal_id, idle_secs = idle, "Session closed due to inactivity");
        IdleStatus::TimedOut {
            employee_id,
            terminal_id,
        }
    }

    /// Countdown for the idle warning, floored at 0.
    pub fn seconds_left(&self) -> i64 {
        let Some(session) = self.current_session() else {
            return 0;
        };
        (self.settings.idle_timeout_secs - session.idle_secs(self.clock.now())).max(0)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn current_user(&self) -> Option<UserView> {
        let (user_id, _) = self.current.as_ref()?;
        self.record(user_id).map(UserRecord::view)
    }

    pub fn current_terminal(&self) -> Option<&str> {
        self.current.as_ref().map(|(_, t)| t.as_str())
    }

    /// The active session bound to this terminal.
    pub fn current_session(&self) -> Option<&Session> {
        let (_, terminal_id) = self.current.as_ref()?;
        self.sessions
            .iter()
            .find(|s| &s.terminal_id == terminal_id && s.is_active)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_session().is_some()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Active sessions idle at or beyond the timeout, at any terminal.
    pub fn stale_sessions(&self) -> Vec<Session> {
        let now = self.clock.now();
        self.sessions
            .iter()
            .filter(|s| s.is_active && s.idle_secs(now) >= self.settings.idle_timeout_secs)
            .cloned()
            .collect()
    }

    /// True if `user_id` holds a live session at a terminal other than
    /// `terminal_id`.
    pub fn is_active_elsewhere(&self, user_id: &str, terminal_id: &str) -> bool {
        self.active_terminal_elsewhere(user_id, terminal_id).is_some()
    }

    pub fn user(&self, user_id: &str) -> Option<UserView> {
        self.record(user_id).map(UserRecord::view)
    }

    pub fn user_by_code(&self, code: &str) -> Option<UserView> {
        self.users.iter().find(|u| u.code == code).map(UserRecord::view)
    }

    pub fn users(&self) -> Vec<UserView> {
        self.users.iter().map(UserRecord::view).collect()
    }

    // -------------------------------------------------------------------------
    // Directory Administration
    // -------------------------------------------------------------------------

    /// Adds an employee; the password is hashed before it is stored.
    pub fn add_user(&mut self, new: NewUser) -> AuthResult<UserView> {
        validate_employee_code(&new.code)?;
        validate_password(&new.password)?;
        if new.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            }
            .into());
        }
        let code = new.code.trim().to_string();
        if self.users.iter().any(|u| u.code == code) {
            return Err(ValidationError::Duplicate {
                field: "employee code".to_string(),
                value: code,
            }
            .into());
        }

        let record = UserRecord {
            id: new.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            code,
            name: new.name.trim().to_string(),
            role: new.role,
            is_active: true,
            password_hash: self.hash_password(&new.password)?,
            last_login: None,
            terminal_id: None,
        };
        let view = record.view();
        self.users.push(record);
        info!(user_id = %view.id, code = %view.code, "Employee added");
        Ok(view)
    }

    /// Activates or deactivates an employee. Deactivation does not end a
    /// session already open; it blocks the next login.
    pub fn set_user_active(&mut self, user_id: &str, active: bool) -> AuthResult<()> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| AuthError::UserNotFound(user_id.to_string()))?;
        user.is_active = active;
        info!(user_id, active, "Employee activation changed");
        Ok(())
    }

    pub fn change_password(&mut self, user_id: &str, new_password: &str) -> AuthResult<()> {
        validate_password(new_password)?;
        let hash = self.hash_password(new_password)?;
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| AuthError::UserNotFound(user_id.to_string()))?;
        user.password_hash = hash;
        info!(user_id, "Employee password changed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> AuthSnapshot {
        let (current_user_id, current_terminal_id) = match &self.current {
            Some((u, t)) => (Some(u.clone()), Some(t.clone())),
            None => (None, None),
        };
        AuthSnapshot {
            users: self.users.clone(),
            sessions: self.sessions.clone(),
            current_user_id,
            current_terminal_id,
        }
    }

    /// Replaces directory and sessions. A persisted login is only resumed
    /// if its session is still active.
    pub fn restore(&mut self, snapshot: AuthSnapshot) {
        self.users = snapshot.users;
        self.sessions = snapshot.sessions;
        self.current = match (snapshot.current_user_id, snapshot.current_terminal_id) {
            (Some(user), Some(terminal)) => Some((user, terminal)),
            _ => None,
        };
        if self.current_session().is_none() {
            self.current = None;
        }
    }

    /// Drops a resumed login that belongs to another terminal. Its session
    /// stays open there.
    pub fn bind_terminal(&mut self, terminal_id: &str) {
        if self.current_terminal().map_or(false, |t| t != terminal_id) {
            debug!(terminal_id, "Ignoring login resumed from another terminal");
            self.current = None;
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn record(&self, user_id: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.id == user_id)
    }

    /// Stale sessions do not count: an abandoned terminal must not lock its
    /// employee out everywhere else.
    fn active_terminal_elsewhere(&self, user_id: &str, terminal_id: &str) -> Option<&str> {
        let now = self.clock.now();
        self.sessions
            .iter()
            .find(|s| {
                s.employee_id == user_id
                    && s.terminal_id != terminal_id
                    && s.is_active
                    && s.idle_secs(now) < self.settings.idle_timeout_secs
            })
            .map(|s| s.terminal_id.as_str())
    }

    fn hash_password(&self, password: &str) -> AuthResult<String> {
        let params = Params::new(
            self.settings.hash_memory_kib,
            self.settings.hash_iterations,
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let salt = SaltString::generate(&mut OsRng);

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        Ok(hash.to_string())
    }
}

/// Checks a password against a PHC string; the cost parameters come from
/// the hash itself.
fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================
