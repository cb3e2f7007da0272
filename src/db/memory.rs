//! In-memory store used by unit tests. Mirrors the PostgreSQL repositories,
//! including the "one valid session per user" transaction semantics.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::error::RepositoryError;
use crate::db::models::login_attempt::LoginAttempt;
use crate::db::models::session::{NewSession, Session, SessionStats};
use crate::db::models::user::{NewUser, User};
use crate::db::repositories::{LoginAttemptStore, SessionStore, UserStore};

#[derive(Default)]
struct State {
    users: Vec<User>,
    sessions: Vec<Session>,
    attempts: HashMap<Uuid, LoginAttempt>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_attempts: AtomicBool,
    fail_session_writes: AtomicBool,
}

fn unmigrated(table: &str) -> RepositoryError {
    RepositoryError::DatabaseError(format!("relation \"{table}\" does not exist"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every ledger call fail as if the table were not migrated.
    pub fn fail_attempts(&self, fail: bool) {
        self.fail_attempts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_session_writes(&self, fail: bool) {
        self.fail_session_writes.store(fail, Ordering::SeqCst);
    }

    pub fn insert_user(&self, user: User) {
        self.state.lock().unwrap().users.push(user);
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.state.lock().unwrap().sessions.clone()
    }

    pub fn valid_sessions_for(&self, user_id: Uuid) -> Vec<Session> {
        self.sessions()
            .into_iter()
            .filter(|s| s.user_id == user_id && s.valid)
            .collect()
    }

    pub fn set_last_activity(&self, session_id: &str, at: Option<DateTime<Utc>>) {
        let mut state = self.state.lock().unwrap();
        if let Some(session) = state.sessions.iter_mut().find(|s| s.id == session_id) {
            session.last_activity = at;
        }
    }

    pub fn attempt(&self, user_id: Uuid) -> Option<LoginAttempt> {
        self.state.lock().unwrap().attempts.get(&user_id).cloned()
    }

    pub fn user(&self, user_id: Uuid) -> Option<User> {
        self.state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
    }

    fn check_attempts(&self) -> Result<(), RepositoryError> {
        if self.fail_attempts.load(Ordering::SeqCst) {
            return Err(unmigrated("login_attempts"));
        }
        Ok(())
    }

    fn check_session_writes(&self) -> Result<(), RepositoryError> {
        if self.fail_session_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::PoolError("connection refused".to_string()));
        }
        Ok(())
    }
}

fn sync_flag(state: &mut State, user_id: Uuid) {
    let logged_in = state
        .sessions
        .iter()
        .any(|s| s.user_id == user_id && s.valid);
    if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
        user.is_logged_in = logged_in;
    }
}

fn sync_all_flags(state: &mut State) -> usize {
    let ids: Vec<Uuid> = state.users.iter().map(|u| u.id).collect();
    let mut corrected = 0;
    for id in ids {
        let before = state.users.iter().find(|u| u.id == id).map(|u| u.is_logged_in);
        sync_flag(state, id);
        let after = state.users.iter().find(|u| u.id == id).map(|u| u.is_logged_in);
        if before != after {
            corrected += 1;
        }
    }
    corrected
}

impl UserStore for MemoryStore {
    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.user(id))
    }

    fn create(&self, new_user: &NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|u| u.email == new_user.email) {
            return Err(RepositoryError::UniqueViolation(
                "duplicate key value violates unique constraint \"users_email_key\"".to_string(),
            ));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email.clone(),
            display_name: new_user.display_name.clone(),
            password_hash: new_user.password_hash.clone(),
            is_admin: new_user.is_admin,
            is_approved: new_user.is_approved,
            is_logged_in: false,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    fn set_approval(
        &self,
        id: Uuid,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Ok(state.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.is_approved = approved;
            user.updated_at = now;
            user.clone()
        }))
    }
}

impl SessionStore for MemoryStore {
    fn create(&self, new_session: &NewSession) -> Result<Session, RepositoryError> {
        self.check_session_writes()?;
        let mut state = self.state.lock().unwrap();
        if !state.users.iter().any(|u| u.id == new_session.user_id) {
            return Err(RepositoryError::NotFound("Record not found".to_string()));
        }
        for session in state
            .sessions
            .iter_mut()
            .filter(|s| s.user_id == new_session.user_id)
        {
            session.valid = false;
        }
        let session = Session {
            id: new_session.id.clone(),
            user_id: new_session.user_id,
            valid: new_session.valid,
            created_at: new_session.created_at,
            last_activity: new_session.last_activity,
            ip_address: new_session.ip_address.clone(),
            user_agent: new_session.user_agent.clone(),
            device_fingerprint: new_session.device_fingerprint.clone(),
            owner_label: new_session.owner_label.clone(),
        };
        state.sessions.push(session.clone());
        sync_flag(&mut state, new_session.user_id);
        Ok(session)
    }

    fn find(&self, session_id: &str) -> Result<Option<Session>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    fn find_valid_for_user(&self, user_id: Uuid) -> Result<Option<Session>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.valid)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    fn find_latest_for_user(&self, user_id: Uuid) -> Result<Option<Session>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Session>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut sessions: Vec<Session> = state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    fn invalidate(&self, session_id: &str) -> Result<bool, RepositoryError> {
        self.check_session_writes()?;
        let mut state = self.state.lock().unwrap();
        let owner = state
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.valid)
            .map(|session| {
                session.valid = false;
                session.user_id
            });
        if let Some(user_id) = owner {
            sync_flag(&mut state, user_id);
        }
        Ok(owner.is_some())
    }

    fn invalidate_all_for_user(
        &self,
        user_id: Uuid,
        except_session_id: Option<&str>,
    ) -> Result<usize, RepositoryError> {
        self.check_session_writes()?;
        let mut state = self.state.lock().unwrap();
        let mut count = 0;
        for session in state.sessions.iter_mut().filter(|s| {
            s.user_id == user_id && s.valid && Some(s.id.as_str()) != except_session_id
        }) {
            session.valid = false;
            count += 1;
        }
        sync_flag(&mut state, user_id);
        Ok(count)
    }

    fn touch(&self, session_id: &str, now: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.valid)
            .map(|session| session.last_activity = Some(now))
            .is_some())
    }

    fn touch_if_idle_since(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
        idle_cutoff: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .iter_mut()
            .find(|s| {
                s.id == session_id && s.valid && s.last_activity.is_none_or(|t| t <= idle_cutoff)
            })
            .map(|session| session.last_activity = Some(now))
            .is_some())
    }

    fn invalidate_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let mut owners = Vec::new();
        for session in state
            .sessions
            .iter_mut()
            .filter(|s| s.valid && s.last_seen() < cutoff)
        {
            session.valid = false;
            owners.push(session.user_id);
        }
        for user_id in &owners {
            sync_flag(&mut state, *user_id);
        }
        Ok(owners.len())
    }

    fn invalidate_all_valid(&self) -> Result<usize, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let mut count = 0;
        for session in state.sessions.iter_mut().filter(|s| s.valid) {
            session.valid = false;
            count += 1;
        }
        sync_all_flags(&mut state);
        Ok(count)
    }

    fn purge_invalid_before(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let before = state.sessions.len();
        state
            .sessions
            .retain(|s| s.valid || s.last_seen() >= cutoff);
        Ok(before - state.sessions.len())
    }

    fn reconcile_login_flags(&self) -> Result<usize, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Ok(sync_all_flags(&mut state))
    }

    fn stats(&self) -> Result<SessionStats, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut users: Vec<Uuid> = state.sessions.iter().map(|s| s.user_id).collect();
        users.sort_unstable();
        users.dedup();
        let mut active_users: Vec<Uuid> = state
            .sessions
            .iter()
            .filter(|s| s.valid)
            .map(|s| s.user_id)
            .collect();
        active_users.sort_unstable();
        active_users.dedup();

        Ok(SessionStats {
            total_sessions: state.sessions.len() as i64,
            active_sessions: state.sessions.iter().filter(|s| s.valid).count() as i64,
            distinct_users: users.len() as i64,
            users_with_active_session: active_users.len() as i64,
        })
    }
}

impl LoginAttemptStore for MemoryStore {
    fn find(&self, user_id: Uuid) -> Result<Option<LoginAttempt>, RepositoryError> {
        self.check_attempts()?;
        Ok(self.attempt(user_id))
    }

    fn increment(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<i32, RepositoryError> {
        self.check_attempts()?;
        let mut state = self.state.lock().unwrap();
        let record = state.attempts.entry(user_id).or_insert(LoginAttempt {
            user_id,
            attempt_count: 0,
            cooldown_until: None,
            last_attempt_at: now,
        });
        record.attempt_count += 1;
        record.last_attempt_at = now;
        Ok(record.attempt_count)
    }

    fn set_cooldown(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.check_attempts()?;
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state.attempts.get_mut(&user_id) {
            record.cooldown_until = Some(until);
        }
        Ok(())
    }

    fn delete(&self, user_id: Uuid) -> Result<bool, RepositoryError> {
        self.check_attempts()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .attempts
            .remove(&user_id)
            .is_some())
    }

    fn delete_idle_before(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        self.check_attempts()?;
        let mut state = self.state.lock().unwrap();
        let before = state.attempts.len();
        state.attempts.retain(|_, a| a.last_attempt_at >= cutoff);
        Ok(before - state.attempts.len())
    }
}
