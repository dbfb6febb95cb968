use async_trait::async_trait;
use sqlx::PgPool;

use super::UserStore;
use crate::models::users::{Challenge, NewUser, UserAccount};

// Runtime-checked queries: building the crate needs no DATABASE_URL.

// Columns may be nullable in tables created before the constraints were
// tightened, so every read goes through this projection.
const USER_COLUMNS: &str = r#"
    user_id,
    username,
    phone_number,
    referral_code,
    invited_by,
    COALESCE(stars, 0) AS stars,
    COALESCE(verified, false) AS verified,
    verification_emojis,
    verification_target,
    verification_intro_message_id,
    verification_message_id::BIGINT AS verification_message_id,
    COALESCE(created_at, NOW()::TIMESTAMP) AS created_at
"#;

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn get_user(&self, user_id: i64) -> Result<Option<UserAccount>, anyhow::Error> {
        let user = sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {USER_COLUMNS} FROM referrals WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> Result<Option<UserAccount>, anyhow::Error> {
        let user = sqlx::query_as::<_, UserAccount>(&format!(
            r#"
            INSERT INTO referrals (user_id, username, phone_number, invited_by, verified)
            VALUES ($1, $2, $3, $4, false)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.user_id)
        .bind(user.username)
        .bind(user.phone_number)
        .bind(user.invited_by)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    async fn upsert_contact(
        &self,
        user_id: i64,
        username: &str,
        phone_number: &str,
    ) -> Result<UserAccount, anyhow::Error> {
        let user = sqlx::query_as::<_, UserAccount>(&format!(
            r#"
            INSERT INTO referrals (user_id, username, phone_number, verified)
            VALUES ($1, $2, $3, false)
            ON CONFLICT (user_id) DO UPDATE
            SET username = EXCLUDED.username, phone_number = EXCLUDED.phone_number
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(username)
        .bind(phone_number)
        .fetch_one(&self.conn)
        .await?;

        Ok(user)
    }

    async fn set_challenge(
        &self,
        user_id: i64,
        challenge: &Challenge,
    ) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(
            r#"
            UPDATE referrals
            SET verification_emojis = $1,
                verification_target = $2,
                verification_intro_message_id = NULL,
                verification_message_id = NULL
            WHERE user_id = $3 AND verified IS NOT TRUE
            "#,
        )
        .bind(challenge.encode())
        .bind(&challenge.target)
        .bind(user_id)
        .execute(&self.conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_challenge_messages(
        &self,
        user_id: i64,
        intro_message_id: Option<i64>,
        choices_message_id: Option<i64>,
    ) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            UPDATE referrals
            SET verification_intro_message_id = $1, verification_message_id = $2
            WHERE user_id = $3
            "#,
        )
        .bind(intro_message_id)
        .bind(choices_message_id)
        .bind(user_id)
        .execute(&self.conn)
        .await?;

        Ok(())
    }

    async fn complete_verification(
        &self,
        user_id: i64,
    ) -> Result<Option<UserAccount>, anyhow::Error> {
        let user = sqlx::query_as::<_, UserAccount>(&format!(
            r#"
            UPDATE referrals
            SET verified = true,
                verification_emojis = NULL,
                verification_target = NULL,
                verification_intro_message_id = NULL,
                verification_message_id = NULL,
                stars = COALESCE(stars, 0) + 1
            WHERE user_id = $1 AND verified IS NOT TRUE
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    async fn credit_referrer(&self, referral_code: &str) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(
            r#"
            UPDATE referrals SET stars = COALESCE(stars, 0) + 1
            WHERE referral_code = $1 AND verified = true
            "#,
        )
        .bind(referral_code)
        .execute(&self.conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_referral_code(&self, user_id: i64, code: &str) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(
            "UPDATE referrals SET referral_code = $1 WHERE user_id = $2 AND referral_code IS NULL",
        )
        .bind(code)
        .bind(user_id)
        .execute(&self.conn)
        .await;

        match result {
            Ok(result) => Ok(result.rows_affected() > 0),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn count_verified_invitees(&self, referral_code: &str) -> Result<i64, anyhow::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM referrals WHERE invited_by = $1 AND verified = true",
        )
        .bind(referral_code)
        .fetch_one(&self.conn)
        .await?;

        Ok(count)
    }

    async fn deduct_points(&self, user_id: i64, amount: i32) -> Result<Option<i32>, anyhow::Error> {
        let balance: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE referrals SET stars = stars - $1
            WHERE user_id = $2 AND stars >= $1
            RETURNING stars
            "#,
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(balance)
    }
}
