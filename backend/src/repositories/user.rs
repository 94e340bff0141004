use sqlx::PgPool;

use crate::models::user::User;
use crate::types::UserId;

pub async fn fetch_user(pool: &PgPool, id: UserId) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, full_name, email, role, created_at, updated_at FROM users WHERE id = $1",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await
}
