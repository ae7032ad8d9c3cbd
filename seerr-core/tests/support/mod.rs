#![allow(dead_code)]

use anyhow::Result;
use seerr_core::database::infrastructure::postgres::PostgresUsersRepository;
use seerr_core::database::ports::users::UsersRepository;
use seerr_core::domain::users::{GroupSet, NewUser, User};
use sqlx::PgPool;

/// Create a plain user for tests that only need a valid foreign key.
pub async fn seed_user(pool: &PgPool, username: &str) -> Result<User> {
    let users = PostgresUsersRepository::new(pool.clone());
    let user = users
        .create_user(NewUser {
            username: username.to_string(),
            email: Some(format!("{username}@example.test")),
            groups: GroupSet::new(),
            password_hash: None,
        })
        .await?;
    Ok(user)
}

pub async fn seed_admin(pool: &PgPool, username: &str) -> Result<User> {
    let users = PostgresUsersRepository::new(pool.clone());
    let user = users
        .create_user(NewUser {
            username: username.to_string(),
            email: None,
            groups: GroupSet::from_csv(GroupSet::ADMIN),
            password_hash: None,
        })
        .await?;
    Ok(user)
}

/// Rows currently stored for one tmdb id, regardless of status.
pub async fn count_requests_for(pool: &PgPool, tmdb_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM media_request WHERE tmdb_id = $1",
    )
    .bind(tmdb_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
