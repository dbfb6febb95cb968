//! In-memory stand-ins for the database and the bot platform.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::{
    orders::{NewOrder, Order, OrderItem, OrderKind},
    telegram::{MembershipStatus, ReplyMarkup},
    users::{Challenge, NewUser, UserAccount},
};
use crate::repositories::{
    telegram::{MessagingError, Messenger},
    OrderStore, UserStore,
};
use crate::services::webhook::BotContext;
use crate::settings;

pub const OPERATOR_A: i64 = 9001;
pub const OPERATOR_B: i64 = 9002;

pub fn account(user_id: i64) -> UserAccount {
    UserAccount {
        user_id,
        username: Some(format!("user{user_id}")),
        phone_number: None,
        referral_code: None,
        invited_by: None,
        stars: 0,
        verified: false,
        verification_emojis: None,
        verification_target: None,
        verification_intro_message_id: None,
        verification_message_id: None,
        created_at: Utc::now().naive_utc(),
    }
}

pub fn store_settings() -> settings::Store {
    settings::Store {
        site_url: "https://store.example".to_string(),
        proofs_channel_url: "https://t.me/proofs".to_string(),
        support_url: "https://t.me/support".to_string(),
        console_url: "https://store.example/admin.html".to_string(),
        fragment_stars_url: "https://fragment.com/stars/buy".to_string(),
        fragment_premium_url: "https://fragment.com/premium/gift".to_string(),
        timezone: chrono_tz::Africa::Cairo,
        opening_hour: 8,
        closing_hour: 24,
        blocked_language_codes: vec!["ru".to_string()],
        blocked_phone_prefixes: vec!["+7".to_string()],
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<i64, UserAccount>>,
    fail: RwLock<bool>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, user: UserAccount) {
        self.users.write().await.insert(user.user_id, user);
    }

    pub async fn user(&self, user_id: i64) -> Option<UserAccount> {
        self.users.read().await.get(&user_id).cloned()
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    async fn check(&self) -> Result<(), anyhow::Error> {
        if *self.fail.read().await {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, user_id: i64) -> Result<Option<UserAccount>, anyhow::Error> {
        self.check().await?;
        Ok(self.user(user_id).await)
    }

    async fn insert_user(&self, user: NewUser) -> Result<Option<UserAccount>, anyhow::Error> {
        self.check().await?;
        let mut users = self.users.write().await;
        if users.contains_key(&user.user_id) {
            return Ok(None);
        }

        let mut record = account(user.user_id);
        record.username = Some(user.username);
        record.phone_number = user.phone_number;
        record.invited_by = user.invited_by;
        users.insert(record.user_id, record.clone());
        Ok(Some(record))
    }

    async fn upsert_contact(
        &self,
        user_id: i64,
        username: &str,
        phone_number: &str,
    ) -> Result<UserAccount, anyhow::Error> {
        self.check().await?;
        let mut users = self.users.write().await;
        let record = users.entry(user_id).or_insert_with(|| account(user_id));
        record.username = Some(username.to_string());
        record.phone_number = Some(phone_number.to_string());
        Ok(record.clone())
    }

    async fn set_challenge(
        &self,
        user_id: i64,
        challenge: &Challenge,
    ) -> Result<bool, anyhow::Error> {
        self.check().await?;
        let mut users = self.users.write().await;
        match users.get_mut(&user_id) {
            Some(record) if !record.verified => {
                record.verification_emojis = Some(challenge.encode());
                record.verification_target = Some(challenge.target.clone());
                record.verification_intro_message_id = None;
                record.verification_message_id = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_challenge_messages(
        &self,
        user_id: i64,
        intro_message_id: Option<i64>,
        choices_message_id: Option<i64>,
    ) -> Result<(), anyhow::Error> {
        self.check().await?;
        if let Some(record) = self.users.write().await.get_mut(&user_id) {
            record.verification_intro_message_id = intro_message_id;
            record.verification_message_id = choices_message_id;
        }
        Ok(())
    }

    async fn complete_verification(
        &self,
        user_id: i64,
    ) -> Result<Option<UserAccount>, anyhow::Error> {
        self.check().await?;
        let mut users = self.users.write().await;
        match users.get_mut(&user_id) {
            Some(record) if !record.verified => {
                record.verified = true;
                record.verification_emojis = None;
                record.verification_target = None;
                record.verification_intro_message_id = None;
                record.verification_message_id = None;
                record.stars += 1;
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn credit_referrer(&self, referral_code: &str) -> Result<bool, anyhow::Error> {
        self.check().await?;
        let mut users = self.users.write().await;
        let referrer = users
            .values_mut()
            .find(|u| u.verified && u.referral_code.as_deref() == Some(referral_code));
        match referrer {
            Some(record) => {
                record.stars += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_referral_code(&self, user_id: i64, code: &str) -> Result<bool, anyhow::Error> {
        self.check().await?;
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.referral_code.as_deref() == Some(code))
        {
            return Ok(false);
        }

        match users.get_mut(&user_id) {
            Some(record) if record.referral_code.is_none() => {
                record.referral_code = Some(code.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_verified_invitees(&self, referral_code: &str) -> Result<i64, anyhow::Error> {
        self.check().await?;
        let count = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.verified && u.invited_by.as_deref() == Some(referral_code))
            .count();
        Ok(count as i64)
    }

    async fn deduct_points(&self, user_id: i64, amount: i32) -> Result<Option<i32>, anyhow::Error> {
        self.check().await?;
        let mut users = self.users.write().await;
        match users.get_mut(&user_id) {
            Some(record) if record.stars >= amount => {
                record.stars -= amount;
                Ok(Some(record.stars))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<Vec<Order>>,
    fail: RwLock<bool>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Order> {
        self.orders.read().await.clone()
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, anyhow::Error> {
        if *self.fail.read().await {
            anyhow::bail!("connection refused");
        }

        let mut orders = self.orders.write().await;
        let (stars, premium_months) = match order.item {
            OrderItem::Stars { quantity } => (Some(quantity), None),
            OrderItem::Premium { months } => (None, Some(months)),
        };
        let record = Order {
            id: orders.len() as i32 + 1,
            username: order.username,
            stars,
            amount_ton: order.amount_ton,
            amount_usd: order.amount_usd,
            kind: order.item.kind(),
            premium_months,
            created_at: order.created_at.naive_utc(),
            completed: false,
        };
        orders.push(record.clone());
        Ok(record)
    }

    async fn list_orders(&self, kind: Option<OrderKind>) -> Result<Vec<Order>, anyhow::Error> {
        if *self.fail.read().await {
            anyhow::bail!("connection refused");
        }

        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .iter()
            .filter(|o| kind.map_or(true, |k| o.kind == k))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn complete_order(&self, order_id: i32) -> Result<bool, anyhow::Error> {
        if *self.fail.read().await {
            anyhow::bail!("connection refused");
        }

        let mut orders = self.orders.write().await;
        match orders.iter_mut().find(|o| o.id == order_id) {
            Some(order) => {
                order.completed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SentMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    pub markup: Option<ReplyMarkup>,
}

/// Records every outbound call. Chats in `unreachable` fail to receive
/// messages, and deletions of ids in `gone` report `NotFound`.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: RwLock<Vec<SentMessage>>,
    deleted: RwLock<Vec<(i64, i64)>>,
    edited: RwLock<Vec<(i64, i64, ReplyMarkup)>>,
    memberships: RwLock<HashMap<i64, MembershipStatus>>,
    unreachable: RwLock<HashSet<i64>>,
    gone: RwLock<HashSet<i64>>,
    next_id: RwLock<i64>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_membership(&self, user_id: i64, status: MembershipStatus) {
        self.memberships.write().await.insert(user_id, status);
    }

    pub async fn set_unreachable(&self, chat_id: i64) {
        self.unreachable.write().await.insert(chat_id);
    }

    pub async fn set_gone(&self, message_id: i64) {
        self.gone.write().await.insert(message_id);
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().await.clone()
    }

    pub async fn sent_to(&self, chat_id: i64) -> Vec<SentMessage> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub async fn deleted(&self) -> Vec<(i64, i64)> {
        self.deleted.read().await.clone()
    }

    pub async fn edited(&self) -> Vec<(i64, i64, ReplyMarkup)> {
        self.edited.read().await.clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> Result<i64, MessagingError> {
        if self.unreachable.read().await.contains(&chat_id) {
            return Err(MessagingError::Api {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }

        let mut next_id = self.next_id.write().await;
        *next_id += 1;
        self.sent.write().await.push(SentMessage {
            chat_id,
            message_id: *next_id,
            text: text.to_string(),
            markup,
        });
        Ok(*next_id)
    }

    async fn edit_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        markup: ReplyMarkup,
    ) -> Result<(), MessagingError> {
        self.edited
            .write()
            .await
            .push((chat_id, message_id, markup));
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), MessagingError> {
        self.deleted.write().await.push((chat_id, message_id));
        if self.gone.read().await.contains(&message_id) {
            return Err(MessagingError::NotFound);
        }
        Ok(())
    }

    async fn membership_status(
        &self,
        user_id: i64,
        _channel: &str,
    ) -> Result<MembershipStatus, MessagingError> {
        Ok(self
            .memberships
            .read()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or(MembershipStatus::Member))
    }
}

pub struct Harness {
    pub users: Arc<MemoryUserStore>,
    pub orders: Arc<MemoryOrderStore>,
    pub messenger: Arc<RecordingMessenger>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            users: Arc::new(MemoryUserStore::new()),
            orders: Arc::new(MemoryOrderStore::new()),
            messenger: Arc::new(RecordingMessenger::new()),
        }
    }

    pub fn context(&self) -> BotContext {
        BotContext {
            users: self.users.clone(),
            orders: self.orders.clone(),
            messenger: self.messenger.clone(),
            operators: vec![OPERATOR_A, OPERATOR_B],
            channel: "PandaStores".to_string(),
            bot_username: "PandaStores_bot".to_string(),
            store: store_settings(),
        }
    }
}
