use crate::db::DbPool;
use crate::db::connection::get_connection;
use crate::db::error::RepositoryError;
use crate::db::models::session::{NewSession, Session, SessionStats};
use crate::db::repositories::SessionStore;
use crate::db::schema::{sessions, users};
use chrono::{DateTime, Utc};
use diesel::dsl::exists;
use diesel::expression_methods::AggregateExpressionMethods;
use diesel::prelude::*;
use uuid::Uuid;

/// Repairs rows whose `is_logged_in` disagrees with the sessions table.
const RECONCILE_LOGIN_FLAGS_SQL: &str = "UPDATE users u SET is_logged_in = NOT u.is_logged_in \
     WHERE u.is_logged_in <> EXISTS (SELECT 1 FROM sessions s WHERE s.user_id = u.id AND s.valid)";

#[derive(Clone)]
pub struct SessionRepository {
    pool: DbPool,
}

impl SessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn sync_login_flag(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<()> {
    let has_valid_session: bool = diesel::select(exists(
        sessions::table
            .filter(sessions::user_id.eq(user_id))
            .filter(sessions::valid.eq(true)),
    ))
    .get_result(conn)?;

    diesel::update(users::table.filter(users::id.eq(user_id)))
        .set(users::is_logged_in.eq(has_valid_session))
        .execute(conn)?;

    Ok(())
}

// At most one valid session per user, so the owners of just-invalidated rows
// have none left.
fn clear_login_flags(conn: &mut PgConnection, user_ids: &[Uuid]) -> QueryResult<()> {
    if user_ids.is_empty() {
        return Ok(());
    }

    diesel::update(users::table.filter(users::id.eq_any(user_ids)))
        .set(users::is_logged_in.eq(false))
        .execute(conn)?;

    Ok(())
}

impl SessionStore for SessionRepository {
    fn create(&self, new_session: &NewSession) -> Result<Session, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            // Row lock on the owner serializes concurrent logins of one account.
            users::table
                .filter(users::id.eq(new_session.user_id))
                .select(users::id)
                .for_update()
                .first::<Uuid>(conn)?;

            diesel::update(
                sessions::table
                    .filter(sessions::user_id.eq(new_session.user_id))
                    .filter(sessions::valid.eq(true)),
            )
            .set(sessions::valid.eq(false))
            .execute(conn)?;

            let session = diesel::insert_into(sessions::table)
                .values(new_session)
                .get_result::<Session>(conn)?;

            diesel::update(users::table.filter(users::id.eq(new_session.user_id)))
                .set(users::is_logged_in.eq(true))
                .execute(conn)?;

            Ok(session)
        })
    }

    fn find(&self, session_id: &str) -> Result<Option<Session>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        sessions::table
            .filter(sessions::id.eq(session_id))
            .first::<Session>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    fn find_valid_for_user(&self, user_id: Uuid) -> Result<Option<Session>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        sessions::table
            .filter(sessions::user_id.eq(user_id))
            .filter(sessions::valid.eq(true))
            .order_by(sessions::created_at.desc())
            .first::<Session>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    fn find_latest_for_user(&self, user_id: Uuid) -> Result<Option<Session>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        sessions::table
            .filter(sessions::user_id.eq(user_id))
            .order_by(sessions::created_at.desc())
            .first::<Session>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Session>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        sessions::table
            .filter(sessions::user_id.eq(user_id))
            .order_by(sessions::created_at.desc())
            .load::<Session>(&mut conn)
            .map_err(Into::into)
    }

    fn invalidate(&self, session_id: &str) -> Result<bool, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            let owners: Vec<Uuid> = diesel::update(
                sessions::table
                    .filter(sessions::id.eq(session_id))
                    .filter(sessions::valid.eq(true)),
            )
            .set(sessions::valid.eq(false))
            .returning(sessions::user_id)
            .get_results(conn)?;

            clear_login_flags(conn, &owners)?;
            Ok(!owners.is_empty())
        })
    }

    fn invalidate_all_for_user(
        &self,
        user_id: Uuid,
        except_session_id: Option<&str>,
    ) -> Result<usize, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            let target = sessions::table
                .filter(sessions::user_id.eq(user_id))
                .filter(sessions::valid.eq(true));

            let invalidated = match except_session_id {
                Some(keep) => diesel::update(target.filter(sessions::id.ne(keep)))
                    .set(sessions::valid.eq(false))
                    .execute(conn)?,
                None => diesel::update(target)
                    .set(sessions::valid.eq(false))
                    .execute(conn)?,
            };

            sync_login_flag(conn, user_id)?;
            Ok(invalidated)
        })
    }

    fn touch(&self, session_id: &str, now: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        let updated = diesel::update(
            sessions::table
                .filter(sessions::id.eq(session_id))
                .filter(sessions::valid.eq(true)),
        )
        .set(sessions::last_activity.eq(Some(now)))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    fn touch_if_idle_since(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
        idle_cutoff: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        let updated = diesel::update(
            sessions::table
                .filter(sessions::id.eq(session_id))
                .filter(sessions::valid.eq(true))
                .filter(
                    sessions::last_activity
                        .is_null()
                        .or(sessions::last_activity.le(idle_cutoff)),
                ),
        )
        .set(sessions::last_activity.eq(Some(now)))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    fn invalidate_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            let owners: Vec<Uuid> = diesel::update(
                sessions::table.filter(sessions::valid.eq(true)).filter(
                    sessions::last_activity.lt(cutoff).or(sessions::last_activity
                        .is_null()
                        .and(sessions::created_at.lt(cutoff))),
                ),
            )
            .set(sessions::valid.eq(false))
            .returning(sessions::user_id)
            .get_results(conn)?;

            clear_login_flags(conn, &owners)?;
            Ok(owners.len())
        })
    }

    fn invalidate_all_valid(&self) -> Result<usize, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            let owners: Vec<Uuid> = diesel::update(sessions::table.filter(sessions::valid.eq(true)))
                .set(sessions::valid.eq(false))
                .returning(sessions::user_id)
                .get_results(conn)?;

            clear_login_flags(conn, &owners)?;
            Ok(owners.len())
        })
    }

    fn purge_invalid_before(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        diesel::delete(
            sessions::table.filter(sessions::valid.eq(false)).filter(
                sessions::last_activity.lt(cutoff).or(sessions::last_activity
                    .is_null()
                    .and(sessions::created_at.lt(cutoff))),
            ),
        )
        .execute(&mut conn)
        .map_err(Into::into)
    }

    fn reconcile_login_flags(&self) -> Result<usize, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        diesel::sql_query(RECONCILE_LOGIN_FLAGS_SQL)
            .execute(&mut conn)
            .map_err(Into::into)
    }

    fn stats(&self) -> Result<SessionStats, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        let total_sessions = sessions::table.count().get_result::<i64>(&mut conn)?;
        let active_sessions = sessions::table
            .filter(sessions::valid.eq(true))
            .count()
            .get_result::<i64>(&mut conn)?;
        let distinct_users = sessions::table
            .select(diesel::dsl::count(sessions::user_id).aggregate_distinct())
            .get_result::<i64>(&mut conn)?;
        let users_with_active_session = sessions::table
            .filter(sessions::valid.eq(true))
            .select(diesel::dsl::count(sessions::user_id).aggregate_distinct())
            .get_result::<i64>(&mut conn)?;

        Ok(SessionStats {
            total_sessions,
            active_sessions,
            distinct_users,
            users_with_active_session,
        })
    }
}
