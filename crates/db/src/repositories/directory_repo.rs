//! Existence checks against the directory tables (`projects`, `persons`,
//! `users`). Those tables are owned elsewhere; nothing here writes to them.

use leadgraph_core::types::DbId;
use sqlx::PgPool;

pub struct DirectoryRepo;

impl DirectoryRepo {
    pub async fn project_exists(pool: &PgPool, project_id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
            .bind(project_id)
            .fetch_one(pool)
            .await
    }

    pub async fn person_in_project(
        pool: &PgPool,
        project_id: DbId,
        person_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM persons WHERE id = $1 AND project_id = $2)",
        )
        .bind(person_id)
        .bind(project_id)
        .fetch_one(pool)
        .await
    }

    pub async fn user_exists(pool: &PgPool, user_id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }
}
