use serde::Serialize;

/// Persisted row of the `referrals` table.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct UserAccount {
    pub user_id: i64,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub referral_code: Option<String>,
    pub invited_by: Option<String>,
    pub stars: i32,
    pub verified: bool,
    pub verification_emojis: Option<String>,
    pub verification_target: Option<String>,
    pub verification_intro_message_id: Option<i64>,
    pub verification_message_id: Option<i64>,
    pub created_at: chrono::NaiveDateTime,
}

impl UserAccount {
    /// The pending challenge, if one was issued and not yet resolved.
    pub fn challenge(&self) -> Option<Challenge> {
        if self.verified {
            return None;
        }

        match (&self.verification_emojis, &self.verification_target) {
            (Some(symbols), Some(target)) => Some(Challenge::decode(symbols, target)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub user_id: i64,
    pub username: String,
    pub phone_number: Option<String>,
    pub invited_by: Option<String>,
}

/// Emoji set shown to the user plus the symbol they must pick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge {
    pub symbols: Vec<String>,
    pub target: String,
}

impl Challenge {
    const SEPARATOR: char = ',';

    pub fn encode(&self) -> String {
        self.symbols.join(&Self::SEPARATOR.to_string())
    }

    pub fn decode(symbols: &str, target: &str) -> Self {
        Self {
            symbols: symbols
                .split(Self::SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            target: target.to_string(),
        }
    }
}
