use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

use crate::db::legacy_repository::LegacyUserRepository;
use crate::models::legacy::LegacyUser;

pub struct PostgresLegacyUserRepository {
    pub pool: PgPool,
}

#[async_trait]
impl LegacyUserRepository for PostgresLegacyUserRepository {
    async fn find_legacy_user(&self, email: &str) -> Result<Option<LegacyUser>, sqlx::Error> {
        sqlx::query_as::<Postgres, LegacyUser>(
            r#"
            SELECT email, products, notes, granted_at, added_by
            FROM legacy_users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn upsert_legacy_user(&self, user: &LegacyUser) -> Result<(), sqlx::Error> {
        sqlx::query::<Postgres>(
            r#"
            INSERT INTO legacy_users (email, products, notes, granted_at, added_by)
            VALUES ($1, $2, $3, now(), $4)
            ON CONFLICT (email) DO UPDATE
            SET products = EXCLUDED.products,
                notes = EXCLUDED.notes,
                granted_at = EXCLUDED.granted_at,
                added_by = EXCLUDED.added_by
            "#,
        )
        .bind(&user.email)
        .bind(&user.products)
        .bind(user.notes.as_deref())
        .bind(user.added_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_legacy_user(&self, email: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query::<Postgres>("DELETE FROM legacy_users WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
