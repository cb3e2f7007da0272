//! Storage seams used by the auth services.
//!
//! Each trait has a diesel/PostgreSQL implementation in this module tree and
//! an in-memory one (`db::memory`) used by unit tests. Timestamps are always
//! supplied by the caller so that the service clock stays the single source
//! of "now".

pub mod login_attempt_repository;
pub mod session_repository;
pub mod user_repository;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::error::RepositoryError;
use crate::db::models::login_attempt::LoginAttempt;
use crate::db::models::session::{NewSession, Session, SessionStats};
use crate::db::models::user::{NewUser, User};

pub use login_attempt_repository::LoginAttemptRepository;
pub use session_repository::SessionRepository;
pub use user_repository::UserRepository;

pub trait UserStore: Send + Sync {
    /// `email` must already be normalized.
    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    fn create(&self, new_user: &NewUser) -> Result<User, RepositoryError>;

    /// Returns `None` when the user does not exist.
    fn set_approval(
        &self,
        id: Uuid,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError>;
}

pub trait SessionStore: Send + Sync {
    /// Invalidates every valid session of `new_session.user_id` and inserts
    /// the new one as a single atomic unit.
    fn create(&self, new_session: &NewSession) -> Result<Session, RepositoryError>;

    fn find(&self, session_id: &str) -> Result<Option<Session>, RepositoryError>;

    /// The user's valid session, regardless of staleness.
    fn find_valid_for_user(&self, user_id: Uuid) -> Result<Option<Session>, RepositoryError>;

    fn find_latest_for_user(&self, user_id: Uuid) -> Result<Option<Session>, RepositoryError>;

    /// Newest first.
    fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Session>, RepositoryError>;

    /// Returns `true` when a valid session was switched off.
    fn invalidate(&self, session_id: &str) -> Result<bool, RepositoryError>;

    fn invalidate_all_for_user(
        &self,
        user_id: Uuid,
        except_session_id: Option<&str>,
    ) -> Result<usize, RepositoryError>;

    /// Unconditional activity bump of a valid session.
    fn touch(&self, session_id: &str, now: DateTime<Utc>) -> Result<bool, RepositoryError>;

    /// Bumps activity only if the session was last touched before `idle_cutoff`.
    fn touch_if_idle_since(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
        idle_cutoff: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Invalidates valid sessions last seen strictly before `cutoff`.
    fn invalidate_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError>;

    fn invalidate_all_valid(&self) -> Result<usize, RepositoryError>;

    /// Hard-deletes invalid sessions last seen before `cutoff`.
    fn purge_invalid_before(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError>;

    /// Recomputes `users.is_logged_in` from the sessions table.
    fn reconcile_login_flags(&self) -> Result<usize, RepositoryError>;

    fn stats(&self) -> Result<SessionStats, RepositoryError>;
}

pub trait LoginAttemptStore: Send + Sync {
    fn find(&self, user_id: Uuid) -> Result<Option<LoginAttempt>, RepositoryError>;

    /// Creates the row with a count of 1 or increments it; returns the new count.
    fn increment(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<i32, RepositoryError>;

    fn set_cooldown(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<(), RepositoryError>;

    fn delete(&self, user_id: Uuid) -> Result<bool, RepositoryError>;

    fn delete_idle_before(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError>;
}
