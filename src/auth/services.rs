// src/auth/services.rs

use std::sync::Arc;

use session_auth_api::{LoginRequest, LoginResponse, SessionStatusResponse, UserResponse};
use uuid::Uuid;

use crate::auth::credentials::CredentialVerifier;
use crate::auth::device::DeviceIdentity;
use crate::auth::guard::CurrentUser;
use crate::auth::jwt::JwtManager;
use crate::auth::ledger::{AttemptLedger, CooldownStatus};
use crate::auth::sessions::SessionManager;
use crate::db::models::session::Session;
use crate::db::models::user::User;
use crate::db::repositories::UserStore;
use crate::error::AppError;

/// Where a login request comes from.
#[derive(Debug, Clone, Copy)]
pub struct LoginOrigin<'a> {
    pub ip: &'a str,
    pub user_agent: &'a str,
}

/// Login orchestration and the self-service session endpoints.
pub struct AuthService {
    verifier: CredentialVerifier,
    users: Arc<dyn UserStore>,
    sessions: Arc<SessionManager>,
    ledger: Arc<AttemptLedger>,
    jwt: JwtManager,
}

impl AuthService {
    pub fn new(
        verifier: CredentialVerifier,
        users: Arc<dyn UserStore>,
        sessions: Arc<SessionManager>,
        ledger: Arc<AttemptLedger>,
        jwt: JwtManager,
    ) -> Self {
        Self {
            verifier,
            users,
            sessions,
            ledger,
            jwt,
        }
    }

    /// Connexion avec contrôle de session unique.
    ///
    /// Admins always get a fresh session. Everyone else is let in when they
    /// come back from the device that holds (or last held) their session,
    /// when they have no session, or when that session went stale; otherwise
    /// the attempt is counted and may trigger a cooldown.
    pub fn login(
        &self,
        request: &LoginRequest,
        origin: LoginOrigin<'_>,
    ) -> Result<LoginResponse, AppError> {
        let user = self.verifier.verify(&request.email, &request.password)?;
        let device = DeviceIdentity::derive(
            origin.ip,
            origin.user_agent,
            request.device_fingerprint.as_deref(),
            self.sessions.now(),
        );

        if user.is_admin {
            if let Err(e) = self.sessions.invalidate_all_for_user(user.id, None) {
                tracing::warn!(user_id = %user.id, "Admin session reset failed: {e}");
            }
            tracing::info!(user_id = %user.id, "Admin login, previous sessions dropped");
            return self.issue(user, origin, &device);
        }

        let current = self
            .sessions
            .find_valid_session(user.id)
            .unwrap_or_else(|e| {
                tracing::warn!(user_id = %user.id, "Active session lookup failed, continuing: {e}");
                None
            });

        let same_device = match &current {
            Some(session) => session.belongs_to_device(&device.fingerprint),
            None => self.last_session_on_device(user.id, &device.fingerprint),
        };
        if same_device {
            tracing::info!(user_id = %user.id, "Same-device login");
            return self.issue(user, origin, &device);
        }

        let cooldown = self.cooldown_status(user.id);
        if cooldown.in_cooldown {
            tracing::info!(
                user_id = %user.id,
                attempt_count = cooldown.attempt_count,
                remaining_seconds = cooldown.remaining_seconds,
                "Login refused during cooldown"
            );
            return Err(AppError::CooldownActive {
                remaining_minutes: cooldown.remaining_minutes(),
            });
        }

        match current {
            None => self.issue(user, origin, &device),
            Some(session) if self.sessions.is_stale(&session) => {
                tracing::info!(user_id = %user.id, session_id = %session.id, "Stale session taken over");
                self.issue(user, origin, &device)
            }
            Some(session) => Err(self.deny_active(&user, &session)),
        }
    }

    // With no valid session left (swept, logged out or closed by an admin),
    // the device of the most recent one still owns the account.
    fn last_session_on_device(&self, user_id: Uuid, fingerprint: &str) -> bool {
        match self.sessions.find_latest_session(user_id) {
            Ok(latest) => latest.is_some_and(|session| session.belongs_to_device(fingerprint)),
            Err(e) => {
                tracing::warn!(%user_id, "Latest session lookup failed: {e}");
                false
            }
        }
    }

    fn cooldown_status(&self, user_id: Uuid) -> CooldownStatus {
        self.ledger.check_cooldown(user_id).unwrap_or_else(|e| {
            tracing::warn!(%user_id, "Cooldown check failed, assuming none: {e}");
            CooldownStatus::default()
        })
    }

    fn deny_active(&self, user: &User, session: &Session) -> AppError {
        let policy = *self.ledger.policy();

        let attempt_count = match self.ledger.record_denial(user.id) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(user_id = %user.id, "Could not record denied login: {e}");
                return AppError::SessionActiveElsewhere {
                    attempts_remaining: policy.attempts_remaining(0),
                    cooldown_minutes: None,
                };
            }
        };

        let cooldown_minutes = self
            .ledger
            .apply_cooldown_if_threshold(user.id, attempt_count)
            .unwrap_or_else(|e| {
                tracing::warn!(user_id = %user.id, "Could not apply cooldown: {e}");
                None
            });

        tracing::warn!(
            user_id = %user.id,
            session_id = %session.id,
            attempt_count,
            "Login refused, session active on another device"
        );

        AppError::SessionActiveElsewhere {
            attempts_remaining: policy.attempts_remaining(attempt_count),
            cooldown_minutes,
        }
    }

    fn issue(
        &self,
        user: User,
        origin: LoginOrigin<'_>,
        device: &DeviceIdentity,
    ) -> Result<LoginResponse, AppError> {
        if let Err(e) = self.ledger.reset(user.id) {
            tracing::warn!(user_id = %user.id, "Attempt ledger reset failed: {e}");
        }

        let session = self
            .sessions
            .create_session(user.id, origin.ip, origin.user_agent, device)?;

        let access_token = self.jwt.generate_access_token(
            user.id,
            &session.id,
            user.is_admin,
            self.sessions.now(),
        )?;

        Ok(LoginResponse {
            success: true,
            access_token,
            user: user.into(),
            expires_in: self.jwt.expires_in(),
        })
    }

    /// Ends the caller's session and clears their attempt ledger.
    pub fn logout(&self, current: &CurrentUser) -> Result<(), AppError> {
        self.sessions.invalidate_session(&current.session_id)?;

        if let Err(e) = self.ledger.reset(current.id) {
            tracing::warn!(user_id = %current.id, "Attempt ledger reset failed: {e}");
        }

        tracing::info!(user_id = %current.id, session_id = %current.session_id, "Logged out");
        Ok(())
    }

    /// Reports whether the token's session is still the user's valid one.
    /// Never touches activity.
    pub fn session_status(&self, token: &str) -> Result<SessionStatusResponse, AppError> {
        let claims = self.jwt.verify_token(token)?;

        let (session_valid, logged_in_elsewhere) =
            match self.sessions.validate_session(&claims.session_id, claims.sub, false) {
                Ok(_) => (true, false),
                Err(AppError::SessionInvalidated) => (false, self.has_valid_session(claims.sub)),
                Err(AppError::SessionNotFound) => (false, false),
                Err(e) => return Err(e),
            };

        let cooldown = self.cooldown_status(claims.sub);

        Ok(SessionStatusResponse {
            session_valid,
            logged_in_elsewhere,
            cooldown_minutes: cooldown.in_cooldown.then(|| cooldown.remaining_minutes()),
        })
    }

    // A displaced session leaves a newer valid one behind; a logged-out one does not.
    fn has_valid_session(&self, user_id: Uuid) -> bool {
        self.sessions
            .find_valid_session(user_id)
            .map(|session| session.is_some())
            .unwrap_or_else(|e| {
                tracing::warn!(%user_id, "Active session lookup failed: {e}");
                true
            })
    }

    pub fn ping(&self, current: &CurrentUser) -> Result<(), AppError> {
        self.sessions.touch_activity(&current.session_id)
    }

    pub fn get_current_user(&self, user_id: Uuid) -> Result<UserResponse, AppError> {
        self.users
            .find_by_id(user_id)?
            .map(Into::into)
            .ok_or(AppError::UserNotFound)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::clock::MockClock;
    use crate::auth::cooldown::CooldownPolicy;
    use crate::auth::credentials::tests::{TEST_COST, user_with_password};
    use crate::auth::guard::SessionGuard;
    use crate::auth::sessions::SessionPolicy;
    use crate::db::memory::MemoryStore;
    use chrono::{Duration, Utc};

    pub(crate) const PASSWORD: &str = "Correct-Horse-9";

    pub(crate) struct Harness {
        pub service: AuthService,
        pub guard: SessionGuard,
        pub sessions: Arc<SessionManager>,
        pub ledger: Arc<AttemptLedger>,
        pub store: Arc<MemoryStore>,
        pub clock: Arc<MockClock>,
        pub jwt: JwtManager,
    }

    pub(crate) fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(MockClock::new(Utc::now()));
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            SessionPolicy::default(),
            clock.clone(),
        ));
        let ledger = Arc::new(AttemptLedger::new(
            store.clone(),
            CooldownPolicy::default(),
            clock.clone(),
        ));
        let jwt = JwtManager::new("service_test_secret", 8);
        let verifier = CredentialVerifier::new(store.clone(), TEST_COST).unwrap();
        let service = AuthService::new(
            verifier,
            store.clone(),
            sessions.clone(),
            ledger.clone(),
            jwt.clone(),
        );
        let guard = SessionGuard::new(jwt.clone(), store.clone(), sessions.clone());
        Harness {
            service,
            guard,
            sessions,
            ledger,
            store,
            clock,
            jwt,
        }
    }

    impl Harness {
        pub fn add_user(&self, email: &str, admin: bool, approved: bool) -> User {
            let user = user_with_password(email, PASSWORD, admin, approved);
            self.store.insert_user(user.clone());
            user
        }

        pub fn login(&self, email: &str, fingerprint: &str) -> Result<LoginResponse, AppError> {
            self.login_with(email, PASSWORD, fingerprint)
        }

        pub fn login_with(
            &self,
            email: &str,
            password: &str,
            fingerprint: &str,
        ) -> Result<LoginResponse, AppError> {
            let request = LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
                device_fingerprint: Some(fingerprint.to_string()),
            };
            self.service.login(
                &request,
                LoginOrigin {
                    ip: "203.0.113.7",
                    user_agent: "Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0",
                },
            )
        }

        fn attempt_count(&self, user_id: Uuid) -> i32 {
            self.store.attempt(user_id).map_or(0, |a| a.attempt_count)
        }
    }

    #[test]
    fn first_login_issues_a_token_bound_to_the_session() {
        let h = harness();
        let user = h.add_user("alice@example.com", false, true);

        let response = h.login("alice@example.com", "laptop").unwrap();

        assert!(response.success);
        assert_eq!(response.user.id, user.id);
        assert_eq!(response.expires_in, 8 * 3600);

        let claims = h.jwt.verify_token(&response.access_token).unwrap();
        let current = h.guard.authenticate(&response.access_token, true).unwrap();
        let valid = h.store.valid_sessions_for(user.id);
        assert_eq!(current.id, user.id);
        assert_eq!(valid.len(), 1);
        assert_eq!(current.session_id, valid[0].id);
        assert_eq!(claims.session_id, valid[0].id);
        assert_eq!(valid[0].device_fingerprint.as_deref(), Some("laptop"));
    }

    #[test]
    fn wrong_password_and_unapproved_account_fail_without_session() {
        let h = harness();
        h.add_user("alice@example.com", false, true);
        let pending = h.add_user("pending@example.com", false, false);

        assert_eq!(
            h.login_with("alice@example.com", "nope", "laptop").unwrap_err(),
            AppError::InvalidCredentials
        );
        assert_eq!(
            h.login("pending@example.com", "laptop").unwrap_err(),
            AppError::AccountNotApproved
        );
        assert!(h.store.sessions().is_empty());
        assert!(h.store.attempt(pending.id).is_none());
    }

    #[test]
    fn other_device_is_denied_and_counted_once() {
        let h = harness();
        let user = h.add_user("alice@example.com", false, true);
        let first = h.login("alice@example.com", "laptop").unwrap();

        let err = h.login("alice@example.com", "phone").unwrap_err();

        assert_eq!(
            err,
            AppError::SessionActiveElsewhere {
                attempts_remaining: 4,
                cooldown_minutes: None
            }
        );
        assert_eq!(h.attempt_count(user.id), 1);
        assert!(h.guard.authenticate(&first.access_token, true).is_ok());
    }

    #[test]
    fn same_device_replaces_the_session_even_in_cooldown() {
        let h = harness();
        let user = h.add_user("alice@example.com", false, true);
        let first = h.login("alice@example.com", "laptop").unwrap();
        for _ in 0..6 {
            let _ = h.login("alice@example.com", "phone");
        }
        assert!(h.ledger.check_cooldown(user.id).unwrap().in_cooldown);

        let second = h.login("alice@example.com", "laptop").unwrap();

        assert_eq!(
            h.guard.authenticate(&first.access_token, true).unwrap_err(),
            AppError::SessionInvalidated
        );
        assert!(h.guard.authenticate(&second.access_token, true).is_ok());
        assert_eq!(h.attempt_count(user.id), 0);
    }

    #[test]
    fn fifth_denial_starts_a_cooldown_that_blocks_every_device() {
        let h = harness();
        let user = h.add_user("alice@example.com", false, true);
        let first = h.login("alice@example.com", "laptop").unwrap();

        for expected_remaining in [4, 3, 2, 1] {
            assert_eq!(
                h.login("alice@example.com", "phone").unwrap_err(),
                AppError::SessionActiveElsewhere {
                    attempts_remaining: expected_remaining,
                    cooldown_minutes: None
                }
            );
        }
        assert_eq!(
            h.login("alice@example.com", "phone").unwrap_err(),
            AppError::SessionActiveElsewhere {
                attempts_remaining: 0,
                cooldown_minutes: Some(15)
            }
        );

        // Attempts during the cooldown are not counted.
        assert_eq!(
            h.login("alice@example.com", "phone").unwrap_err(),
            AppError::CooldownActive {
                remaining_minutes: 15
            }
        );
        assert_eq!(h.attempt_count(user.id), 5);

        // The next breach after expiry doubles the penalty.
        h.clock.advance(Duration::minutes(16));
        assert_eq!(
            h.login("alice@example.com", "phone").unwrap_err(),
            AppError::SessionActiveElsewhere {
                attempts_remaining: 0,
                cooldown_minutes: Some(30)
            }
        );
        assert_eq!(
            h.login("alice@example.com", "tablet").unwrap_err(),
            AppError::CooldownActive {
                remaining_minutes: 30
            }
        );
        assert!(h.guard.authenticate(&first.access_token, true).is_ok());
    }

    #[test]
    fn owner_device_gets_back_in_after_its_idle_session_is_swept() {
        let h = harness();
        let user = h.add_user("alice@example.com", false, true);
        h.login("alice@example.com", "laptop").unwrap();

        h.clock.advance(Duration::minutes(20));
        for _ in 0..5 {
            let _ = h.login("alice@example.com", "phone");
        }
        h.clock.advance(Duration::minutes(11));
        assert_eq!(h.sessions.cleanup_inactive().unwrap(), 1);
        assert!(h.ledger.check_cooldown(user.id).unwrap().in_cooldown);

        assert_eq!(
            h.login("alice@example.com", "phone").unwrap_err(),
            AppError::CooldownActive {
                remaining_minutes: 4
            }
        );
        let back = h.login("alice@example.com", "laptop").unwrap();

        assert!(h.guard.authenticate(&back.access_token, true).is_ok());
        assert_eq!(h.store.valid_sessions_for(user.id).len(), 1);
        assert_eq!(h.attempt_count(user.id), 0);
    }

    #[test]
    fn stale_session_is_taken_over_silently() {
        let h = harness();
        let user = h.add_user("alice@example.com", false, true);
        let first = h.login("alice@example.com", "laptop").unwrap();

        h.clock.advance(Duration::hours(25));
        let second = h.login("alice@example.com", "phone").unwrap();

        assert_eq!(
            h.guard.authenticate(&first.access_token, true).unwrap_err(),
            AppError::SessionInvalidated
        );
        assert!(h.guard.authenticate(&second.access_token, true).is_ok());
        assert_eq!(h.store.valid_sessions_for(user.id).len(), 1);
        assert_eq!(h.attempt_count(user.id), 0);
    }

    #[test]
    fn admin_bypasses_active_session_and_cooldown() {
        let h = harness();
        let admin = h.add_user("root@example.com", true, false);
        let first = h.login("root@example.com", "laptop").unwrap();
        h.ledger.record_denial(admin.id).unwrap();
        h.ledger.apply_cooldown_if_threshold(admin.id, 5).unwrap();

        let second = h.login("root@example.com", "phone").unwrap();

        assert!(second.user.is_admin);
        assert_eq!(
            h.guard.authenticate(&first.access_token, true).unwrap_err(),
            AppError::SessionInvalidated
        );
        assert!(h.store.attempt(admin.id).is_none());
    }

    #[test]
    fn logout_invalidates_and_resets_the_ledger() {
        let h = harness();
        let user = h.add_user("alice@example.com", false, true);
        let login = h.login("alice@example.com", "laptop").unwrap();
        let _ = h.login("alice@example.com", "phone");
        let current = h.guard.authenticate(&login.access_token, false).unwrap();

        h.service.logout(&current).unwrap();

        assert_eq!(
            h.sessions
                .validate_session(&current.session_id, user.id, false)
                .unwrap_err(),
            AppError::SessionInvalidated
        );
        assert_eq!(h.attempt_count(user.id), 0);
        assert!(!h.store.user(user.id).unwrap().is_logged_in);
        assert!(h.login("alice@example.com", "phone").is_ok());
    }

    #[test]
    fn missing_ledger_table_degrades_to_plain_login() {
        let h = harness();
        h.add_user("alice@example.com", false, true);
        h.store.fail_attempts(true);

        h.login("alice@example.com", "laptop").unwrap();
        assert_eq!(
            h.login("alice@example.com", "phone").unwrap_err(),
            AppError::SessionActiveElsewhere {
                attempts_remaining: 5,
                cooldown_minutes: None
            }
        );
        assert!(h.login("alice@example.com", "laptop").is_ok());
    }

    #[test]
    fn session_write_failure_is_fatal() {
        let h = harness();
        h.add_user("alice@example.com", false, true);
        h.store.fail_session_writes(true);

        let err = h.login("alice@example.com", "laptop").unwrap_err();

        assert!(matches!(err, AppError::DatabaseError(_)));
        assert!(h.store.sessions().is_empty());
    }

    #[test]
    fn session_status_reports_displacement_and_cooldown() {
        let h = harness();
        h.add_user("alice@example.com", false, true);
        let first = h.login("alice@example.com", "laptop").unwrap();

        assert_eq!(
            h.service.session_status(&first.access_token).unwrap(),
            SessionStatusResponse {
                session_valid: true,
                logged_in_elsewhere: false,
                cooldown_minutes: None
            }
        );

        h.clock.advance(Duration::hours(25));
        h.login("alice@example.com", "phone").unwrap();

        let status = h.service.session_status(&first.access_token).unwrap();
        assert!(!status.session_valid);
        assert!(status.logged_in_elsewhere);
    }

    #[test]
    fn session_status_after_logout_is_not_elsewhere() {
        let h = harness();
        h.add_user("alice@example.com", false, true);
        let login = h.login("alice@example.com", "laptop").unwrap();
        h.service
            .logout(&h.guard.authenticate(&login.access_token, false).unwrap())
            .unwrap();

        let status = h.service.session_status(&login.access_token).unwrap();

        assert!(!status.session_valid);
        assert!(!status.logged_in_elsewhere);
    }

    #[test]
    fn session_status_does_not_touch_activity() {
        let h = harness();
        let user = h.add_user("alice@example.com", false, true);
        let login = h.login("alice@example.com", "laptop").unwrap();
        let before = h.store.valid_sessions_for(user.id)[0].last_activity;

        h.clock.advance(Duration::minutes(10));
        h.service.session_status(&login.access_token).unwrap();

        assert_eq!(h.store.valid_sessions_for(user.id)[0].last_activity, before);
    }

    #[test]
    fn ping_is_throttled_per_interval() {
        let h = harness();
        h.add_user("alice@example.com", false, true);
        let login = h.login("alice@example.com", "laptop").unwrap();
        let current = h.guard.authenticate(&login.access_token, false).unwrap();

        assert!(matches!(
            h.service.ping(&current),
            Err(AppError::PingThrottled { .. })
        ));
        h.clock.advance(Duration::minutes(5));
        assert!(h.service.ping(&current).is_ok());
    }

    #[test]
    fn current_user_never_exposes_the_hash() {
        let h = harness();
        let user = h.add_user("alice@example.com", false, true);

        let profile = h.service.get_current_user(user.id).unwrap();
        let json = serde_json::to_string(&profile).unwrap();

        assert_eq!(profile.email, "alice@example.com");
        assert!(!json.contains("password"));
        assert_eq!(
            h.service.get_current_user(Uuid::new_v4()).unwrap_err(),
            AppError::UserNotFound
        );
    }

    #[test]
    fn concurrent_logins_leave_one_valid_session() {
        let h = Arc::new(harness());
        let user = h.add_user("alice@example.com", false, true);

        std::thread::scope(|scope| {
            for device in ["a", "b", "c", "d"] {
                let h = h.clone();
                scope.spawn(move || {
                    let _ = h.login("alice@example.com", device);
                });
            }
        });

        assert_eq!(h.store.valid_sessions_for(user.id).len(), 1);
    }
}
