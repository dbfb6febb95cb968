use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{
    orders::{NewOrder, Order, OrderKind},
    users::{Challenge, NewUser, UserAccount},
};

pub mod orders;
pub mod telegram;
pub mod users;

/// Row-scoped operations on the `referrals` table. Every method is a
/// single statement; nothing here spans rows except `credit_referrer`,
/// which touches only the inviter.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn get_user(&self, user_id: i64) -> Result<Option<UserAccount>, anyhow::Error>;

    /// Inserts a fresh unverified account. Returns `None` when the user
    /// already has one.
    async fn insert_user(&self, user: NewUser) -> Result<Option<UserAccount>, anyhow::Error>;

    /// Stores phone and username, creating the account if needed.
    async fn upsert_contact(
        &self,
        user_id: i64,
        username: &str,
        phone_number: &str,
    ) -> Result<UserAccount, anyhow::Error>;

    /// Replaces the pending challenge of an unverified account.
    async fn set_challenge(&self, user_id: i64, challenge: &Challenge)
        -> Result<bool, anyhow::Error>;

    /// Records the ids of the challenge prompt and its choice keyboard.
    async fn set_challenge_messages(
        &self,
        user_id: i64,
        intro_message_id: Option<i64>,
        choices_message_id: Option<i64>,
    ) -> Result<(), anyhow::Error>;

    /// Flips `verified`, clears the challenge and credits one point.
    /// Returns `None` if the account was already verified.
    async fn complete_verification(
        &self,
        user_id: i64,
    ) -> Result<Option<UserAccount>, anyhow::Error>;

    /// Credits one point to the verified owner of `referral_code`.
    async fn credit_referrer(&self, referral_code: &str) -> Result<bool, anyhow::Error>;

    /// Assigns a referral code if the account has none. Returns `false`
    /// when the code is already taken by someone else.
    async fn set_referral_code(&self, user_id: i64, code: &str) -> Result<bool, anyhow::Error>;

    async fn count_verified_invitees(&self, referral_code: &str) -> Result<i64, anyhow::Error>;

    /// Subtracts `amount` if the balance covers it. Returns the new
    /// balance, or `None` when it does not.
    async fn deduct_points(&self, user_id: i64, amount: i32) -> Result<Option<i32>, anyhow::Error>;
}

#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, anyhow::Error>;

    /// Newest first, optionally restricted to one kind.
    async fn list_orders(&self, kind: Option<OrderKind>) -> Result<Vec<Order>, anyhow::Error>;

    /// Marks the order completed. Returns `false` for an unknown id.
    async fn complete_order(&self, order_id: i32) -> Result<bool, anyhow::Error>;
}

/// Creates the tables if they are missing. Safe to run on every start.
pub async fn provision(conn: &PgPool) -> Result<(), anyhow::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS referrals (
            user_id BIGINT PRIMARY KEY,
            username VARCHAR(255),
            phone_number VARCHAR(20),
            referral_code VARCHAR(10) UNIQUE,
            invited_by VARCHAR(10),
            stars INTEGER NOT NULL DEFAULT 0 CHECK (stars >= 0),
            verified BOOLEAN NOT NULL DEFAULT false,
            verification_emojis VARCHAR(100),
            verification_target VARCHAR(16),
            verification_intro_message_id BIGINT,
            verification_message_id BIGINT,
            created_at TIMESTAMP NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(conn)
    .await?;

    for column in [
        "verification_target VARCHAR(16)",
        "verification_intro_message_id BIGINT",
    ] {
        sqlx::query(&format!(
            "ALTER TABLE referrals ADD COLUMN IF NOT EXISTS {column}"
        ))
        .execute(conn)
        .await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id SERIAL PRIMARY KEY,
            username VARCHAR(255) NOT NULL,
            stars INTEGER,
            amount_ton VARCHAR(50) NOT NULL,
            amount_usd VARCHAR(50) NOT NULL,
            type VARCHAR(10) CHECK (type IN ('stars', 'premium')) DEFAULT 'stars',
            premium_months INTEGER,
            created_at TIMESTAMP DEFAULT NOW() NOT NULL,
            completed BOOLEAN DEFAULT false
        )
        "#,
    )
    .execute(conn)
    .await?;

    log::info!("Database tables are in place.");
    Ok(())
}
