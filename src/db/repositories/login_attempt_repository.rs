use crate::db::DbPool;
use crate::db::connection::get_connection;
use crate::db::error::RepositoryError;
use crate::db::models::login_attempt::{LoginAttempt, NewLoginAttempt};
use crate::db::repositories::LoginAttemptStore;
use crate::db::schema::login_attempts;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

#[derive(Clone)]
pub struct LoginAttemptRepository {
    pool: DbPool,
}

impl LoginAttemptRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl LoginAttemptStore for LoginAttemptRepository {
    fn find(&self, user_id: Uuid) -> Result<Option<LoginAttempt>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        login_attempts::table
            .filter(login_attempts::user_id.eq(user_id))
            .first::<LoginAttempt>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    fn increment(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<i32, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        let first_attempt = NewLoginAttempt {
            user_id,
            attempt_count: 1,
            last_attempt_at: now,
        };

        diesel::insert_into(login_attempts::table)
            .values(&first_attempt)
            .on_conflict(login_attempts::user_id)
            .do_update()
            .set((
                login_attempts::attempt_count.eq(login_attempts::attempt_count + 1),
                login_attempts::last_attempt_at.eq(now),
            ))
            .returning(login_attempts::attempt_count)
            .get_result::<i32>(&mut conn)
            .map_err(Into::into)
    }

    fn set_cooldown(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        diesel::update(login_attempts::table.filter(login_attempts::user_id.eq(user_id)))
            .set(login_attempts::cooldown_until.eq(Some(until)))
            .execute(&mut conn)?;

        Ok(())
    }

    fn delete(&self, user_id: Uuid) -> Result<bool, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        let deleted =
            diesel::delete(login_attempts::table.filter(login_attempts::user_id.eq(user_id)))
                .execute(&mut conn)?;

        Ok(deleted > 0)
    }

    fn delete_idle_before(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        diesel::delete(login_attempts::table.filter(login_attempts::last_attempt_at.lt(cutoff)))
            .execute(&mut conn)
            .map_err(Into::into)
    }
}
