use crate::db::DbPool;
use crate::db::connection::get_connection;
use crate::db::error::RepositoryError;
use crate::db::models::user::{NewUser, User};
use crate::db::repositories::UserStore;
use crate::db::schema::users;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl UserStore for UserRepository {
    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        users::table
            .filter(users::email.eq(email))
            .first::<User>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        users::table
            .filter(users::id.eq(id))
            .first::<User>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    fn create(&self, new_user: &NewUser) -> Result<User, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        diesel::insert_into(users::table)
            .values(new_user)
            .get_result::<User>(&mut conn)
            .map_err(Into::into)
    }

    fn set_approval(
        &self,
        id: Uuid,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;

        diesel::update(users::table.filter(users::id.eq(id)))
            .set((users::is_approved.eq(approved), users::updated_at.eq(now)))
            .get_result::<User>(&mut conn)
            .optional()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::test_pool;

    fn new_user(suffix: &str) -> NewUser {
        NewUser {
            email: format!("user_{suffix}_{}@example.com", Uuid::new_v4()),
            display_name: format!("User {suffix}"),
            password_hash: "test_hash".to_string(),
            is_admin: false,
            is_approved: true,
        }
    }

    #[test]
    #[ignore = "requires DATABASE_URL"]
    fn create_then_find_by_email() {
        let repo = UserRepository::new(test_pool());
        let created = repo.create(&new_user("find")).expect("create user");

        let found = repo
            .find_by_email(&created.email)
            .expect("query")
            .expect("user exists");

        assert_eq!(found.id, created.id);
        assert!(!found.is_logged_in);
    }

    #[test]
    #[ignore = "requires DATABASE_URL"]
    fn duplicate_email_is_a_unique_violation() {
        let repo = UserRepository::new(test_pool());
        let user = new_user("dup");
        repo.create(&user).expect("first insert");

        let result = repo.create(&user);

        assert!(matches!(result, Err(RepositoryError::UniqueViolation(_))));
    }

    #[test]
    #[ignore = "requires DATABASE_URL"]
    fn set_approval_on_unknown_user_returns_none() {
        let repo = UserRepository::new(test_pool());

        let result = repo
            .set_approval(Uuid::new_v4(), true, Utc::now())
            .expect("query");

        assert!(result.is_none());
    }
}
