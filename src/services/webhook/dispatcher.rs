use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use rand::{distr::Alphanumeric, Rng};

use super::{
    event::{self, ButtonAction, EntryCommand, Event, StaticCommand},
    texts, BotContext,
};
use crate::{
    models::{
        telegram::{InlineKeyboardButton, ReplyMarkup, Update},
        users::{NewUser, UserAccount},
    },
    repositories::telegram::MessagingError,
    services::{challenge, ServiceError},
    settings::Store,
};

const REFERRAL_CODE_LEN: usize = 6;
const REFERRAL_CODE_ATTEMPTS: usize = 5;
const MAX_STORED_CODE_LEN: usize = 10;
const UNKNOWN_USERNAME: &str = "unknown";

macro_rules! db {
    ($e:expr) => {
        $e.await.map_err(|e| ServiceError::Database(e.to_string()))
    };
}

pub struct Dispatcher {
    ctx: BotContext,
}

impl Dispatcher {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    /// Handles one update end to end. Never fails: business errors are
    /// reported to the user, the transport always gets its acknowledgment.
    pub async fn dispatch(&self, update: Update) {
        let event = event::classify(&update, &self.ctx.store.blocked_language_codes);
        log::debug!("Update {:?} classified as {}", update.update_id, event.name());

        let reply_chat = event.reply_chat();
        let name = event.name();
        if let Err(e) = self.route(event).await {
            log::error!("Failed to handle {} for update {:?}: {}", name, update.update_id, e);
            if let Some(chat_id) = reply_chat {
                self.send(chat_id, texts::SERVICE_UNAVAILABLE, None).await;
            }
        }
    }

    async fn route(&self, event: Event) -> Result<(), ServiceError> {
        match event {
            Event::GeoBlocked { chat_id } => {
                self.send(chat_id, texts::GEO_REFUSAL, None).await;
                Ok(())
            }
            Event::SubscriptionCheck { user_id } => self.subscription_check(user_id).await,
            Event::EntryCommand { user_id, command } => self.entry_command(user_id, command).await,
            Event::RegistrationStart { user_id } => self.registration_start(user_id).await,
            Event::ChallengeAnswer {
                user_id,
                message_id,
                selected,
            } => self.challenge_answer(user_id, message_id, &selected).await,
            Event::ContactShared {
                user_id,
                username,
                phone_number,
            } => self.contact_shared(user_id, username, &phone_number).await,
            Event::ForeignContact { user_id } => {
                log::warn!("User {} shared a contact that is not their own.", user_id);
                self.send(
                    user_id,
                    texts::OWN_CONTACT_ONLY,
                    Some(ReplyMarkup::request_contact(texts::SHARE_PHONE_BUTTON)),
                )
                .await;
                Ok(())
            }
            Event::ReferralStart {
                user_id,
                username,
                code,
            } => self.referral_start(user_id, username, &code).await,
            Event::InviteCommand { user_id } => self.invite_command(user_id).await,
            Event::ShopCommand { user_id } => self.shop_command(user_id).await,
            Event::BuyFixed {
                user_id,
                username,
                amount,
            } => self.purchase(user_id, username, amount, false).await,
            Event::BuyCustomAmount {
                user_id,
                username,
                text,
            } => self.buy_custom_amount(user_id, username, &text).await,
            Event::StaticCommand { chat_id, command } => {
                self.static_command(chat_id, command).await;
                Ok(())
            }
            Event::ButtonAction {
                chat_id,
                message_id,
                from_id,
                action,
            } => self.button_action(chat_id, message_id, from_id, action).await,
            Event::Unhandled => Ok(()),
        }
    }

    async fn subscription_check(&self, user_id: i64) -> Result<(), ServiceError> {
        if self.is_subscribed(user_id).await {
            self.prompt_for_phone(user_id).await;
        } else {
            self.send(
                user_id,
                texts::NOT_SUBSCRIBED,
                Some(texts::join_markup(&self.ctx.channel)),
            )
            .await;
        }
        Ok(())
    }

    async fn entry_command(&self, user_id: i64, command: EntryCommand) -> Result<(), ServiceError> {
        if !self.is_subscribed(user_id).await {
            self.send(
                user_id,
                texts::SUBSCRIBE_FIRST,
                Some(texts::join_markup(&self.ctx.channel)),
            )
            .await;
            return Ok(());
        }

        match command.resolve(user_id) {
            Event::RegistrationStart { user_id } => self.registration_start(user_id).await,
            Event::ShopCommand { user_id } => self.shop_command(user_id).await,
            Event::InviteCommand { user_id } => self.invite_command(user_id).await,
            _ => Ok(()),
        }
    }

    async fn registration_start(&self, user_id: i64) -> Result<(), ServiceError> {
        let Some(account) = db!(self.ctx.users.get_user(user_id))? else {
            self.prompt_for_phone(user_id).await;
            return Ok(());
        };

        if account.verified {
            // Verified users get the plain welcome that `/start` always sent.
            self.send(
                user_id,
                &texts::welcome(false),
                Some(texts::welcome_markup(&self.ctx.store.proofs_channel_url)),
            )
            .await;
        } else if account.challenge().is_none() {
            self.issue_challenge(user_id, texts::CHALLENGE_INTRO).await?;
        } else {
            log::debug!("User {} already has a pending challenge.", user_id);
        }

        Ok(())
    }

    async fn issue_challenge(&self, user_id: i64, intro: &str) -> Result<(), ServiceError> {
        let challenge = challenge::issue();
        if !db!(self.ctx.users.set_challenge(user_id, &challenge))? {
            log::warn!("Could not store challenge for user {}.", user_id);
            return Ok(());
        }

        let intro_message = self
            .send(user_id, &format!("{} {}", intro, challenge.target), None)
            .await;
        let choices_message = self
            .send(
                user_id,
                texts::CHALLENGE_CHOICES,
                Some(texts::challenge_markup(&challenge.symbols)),
            )
            .await;

        if intro_message.is_some() || choices_message.is_some() {
            db!(self
                .ctx
                .users
                .set_challenge_messages(user_id, intro_message, choices_message))?;
        }

        Ok(())
    }

    async fn challenge_answer(
        &self,
        user_id: i64,
        message_id: Option<i64>,
        selected: &str,
    ) -> Result<(), ServiceError> {
        let account = db!(self.ctx.users.get_user(user_id))?;
        let Some((account, challenge)) =
            account.and_then(|a| a.challenge().map(|c| (a, c)))
        else {
            self.send(user_id, texts::NO_ACTIVE_CHALLENGE, None).await;
            return Ok(());
        };

        if !challenge::evaluate(selected, &challenge.target) {
            self.send(user_id, texts::WRONG_EMOJI, None).await;
            return Ok(());
        }

        let Some(verified) = db!(self.ctx.users.complete_verification(user_id))? else {
            log::info!("User {} was verified concurrently.", user_id);
            return Ok(());
        };
        log::info!("User {} verified, balance {}.", user_id, verified.stars);

        if let Some(code) = account.invited_by.as_deref() {
            if db!(self.ctx.users.credit_referrer(code))? {
                log::info!("Credited referrer {} for user {}.", code, user_id);
            }
        }

        let mut challenge_messages: Vec<i64> = Vec::with_capacity(3);
        for id in [
            account.verification_intro_message_id,
            account.verification_message_id,
            message_id,
        ]
        .into_iter()
        .flatten()
        {
            if !challenge_messages.contains(&id) {
                challenge_messages.push(id);
            }
        }
        for id in challenge_messages {
            self.delete(user_id, id).await;
        }

        self.send(
            user_id,
            &texts::welcome(true),
            Some(texts::welcome_markup(&self.ctx.store.proofs_channel_url)),
        )
        .await;

        Ok(())
    }

    async fn contact_shared(
        &self,
        user_id: i64,
        username: Option<String>,
        phone_number: &str,
    ) -> Result<(), ServiceError> {
        let phone_number = normalize_phone(phone_number);
        if self
            .ctx
            .store
            .blocked_phone_prefixes
            .iter()
            .any(|prefix| phone_number.starts_with(prefix.as_str()))
        {
            self.send(user_id, texts::GEO_REFUSAL, None).await;
            return Ok(());
        }

        let username = username.unwrap_or_else(|| UNKNOWN_USERNAME.to_string());
        let account = db!(self
            .ctx
            .users
            .upsert_contact(user_id, &username, &phone_number))?;

        if account.verified {
            self.send(user_id, texts::PHONE_UPDATED, None).await;
            return Ok(());
        }

        self.issue_challenge(user_id, texts::CONTACT_CHALLENGE_INTRO)
            .await
    }

    async fn referral_start(
        &self,
        user_id: i64,
        username: Option<String>,
        code: &str,
    ) -> Result<(), ServiceError> {
        if db!(self.ctx.users.get_user(user_id))?.is_some() {
            return Ok(());
        }

        let invited_by = storable_code(code);
        if invited_by.is_none() {
            log::warn!("Ignoring oversized referral payload from user {}.", user_id);
        }

        let user = NewUser {
            user_id,
            username: username.unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
            phone_number: None,
            invited_by,
        };
        if db!(self.ctx.users.insert_user(user))?.is_some() {
            self.send(user_id, texts::REFERRAL_REGISTERED, None).await;
        }

        Ok(())
    }

    async fn invite_command(&self, user_id: i64) -> Result<(), ServiceError> {
        let Some(account) = db!(self.ctx.users.get_user(user_id))? else {
            self.send(user_id, texts::REGISTER_FIRST, None).await;
            return Ok(());
        };

        let code = match account.referral_code.clone() {
            Some(code) => code,
            None => self.assign_referral_code(&account).await?,
        };

        let link = format!("https://t.me/{}?start={}", self.ctx.bot_username, code);
        let invitees = db!(self.ctx.users.count_verified_invitees(&code))?;
        let share_url = reqwest::Url::parse_with_params(
            "https://t.me/share/url",
            &[
                ("url", link.as_str()),
                ("text", "Join the Telegram stars bot!"),
            ],
        )
        .map(String::from)
        .unwrap_or_else(|_| link.clone());

        self.send(
            user_id,
            &texts::invite(&link, invitees, account.stars),
            Some(ReplyMarkup::inline(vec![vec![InlineKeyboardButton::url(
                "Share the link",
                share_url,
            )]])),
        )
        .await;

        Ok(())
    }

    async fn assign_referral_code(&self, account: &UserAccount) -> Result<String, ServiceError> {
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let code = new_referral_code();
            if db!(self.ctx.users.set_referral_code(account.user_id, &code))? {
                return Ok(code);
            }

            // Either the code collided or another request assigned one first.
            if let Some(code) = db!(self.ctx.users.get_user(account.user_id))?
                .and_then(|a| a.referral_code)
            {
                return Ok(code);
            }
        }

        Err(ServiceError::Database(format!(
            "Could not assign a referral code to user {}",
            account.user_id
        )))
    }

    async fn shop_command(&self, user_id: i64) -> Result<(), ServiceError> {
        let Some(account) = db!(self.ctx.users.get_user(user_id))? else {
            self.send(user_id, texts::REGISTER_FIRST, None).await;
            return Ok(());
        };

        self.send(
            user_id,
            &texts::shop(account.stars),
            Some(texts::shop_markup()),
        )
        .await;

        Ok(())
    }

    async fn buy_custom_amount(
        &self,
        user_id: i64,
        username: Option<String>,
        text: &str,
    ) -> Result<(), ServiceError> {
        match parse_leading_int(text) {
            Some(amount) if amount >= texts::CUSTOM_AMOUNT_MIN => {
                self.purchase(user_id, username, amount, true).await
            }
            _ => {
                self.send(user_id, texts::CUSTOM_AMOUNT_MINIMUM, None).await;
                Ok(())
            }
        }
    }

    /// Spends `amount` points. Fixed denominations are final once deducted;
    /// custom amounts give operators a confirmation button that tells the
    /// buyer when the stars were sent.
    async fn purchase(
        &self,
        user_id: i64,
        username: Option<String>,
        amount: i32,
        needs_confirmation: bool,
    ) -> Result<(), ServiceError> {
        let Some(balance) = db!(self.ctx.users.deduct_points(user_id, amount))? else {
            self.send(user_id, texts::INSUFFICIENT_BALANCE, None).await;
            return Ok(());
        };
        log::info!(
            "User {} spent {} points, {} left.",
            user_id,
            amount,
            balance
        );

        let username = username.unwrap_or_else(|| UNKNOWN_USERNAME.to_string());
        let markup = needs_confirmation.then(|| {
            ReplyMarkup::inline(vec![vec![InlineKeyboardButton::callback(
                "✅ Confirm fulfilment",
                format!("confirm_stars_{}_{}", user_id, amount),
            )]])
        });
        self.notify_operators(&texts::purchase_request(&username, amount, user_id), markup)
            .await;

        self.send(user_id, &texts::purchase_accepted(amount), None)
            .await;

        Ok(())
    }

    async fn static_command(&self, chat_id: i64, command: StaticCommand) {
        match command {
            StaticCommand::Help => {
                self.send(
                    chat_id,
                    texts::SUPPORT,
                    Some(texts::support_markup(&self.ctx.store.support_url)),
                )
                .await;
            }
            StaticCommand::Database => {
                self.send(
                    chat_id,
                    texts::CONSOLE,
                    Some(ReplyMarkup::inline(vec![vec![
                        InlineKeyboardButton::web_app("DataBase🚀", self.ctx.store.console_url.clone()),
                    ]])),
                )
                .await;
            }
        }
    }

    async fn button_action(
        &self,
        chat_id: i64,
        message_id: Option<i64>,
        from_id: i64,
        action: ButtonAction,
    ) -> Result<(), ServiceError> {
        if action.operator_only() && !self.ctx.operators.contains(&from_id) {
            log::warn!("User {} pressed an operator control: {:?}", from_id, action);
            return Ok(());
        }

        match action {
            ButtonAction::BusinessHours => self.business_hours(chat_id).await,
            ButtonAction::ContactOperator => {
                self.send(
                    chat_id,
                    texts::SUPPORT,
                    Some(texts::support_markup(&self.ctx.store.support_url)),
                )
                .await;
            }
            ButtonAction::CustomAmountPrompt => {
                self.send(
                    from_id,
                    texts::CUSTOM_AMOUNT_PROMPT,
                    Some(ReplyMarkup::force_reply()),
                )
                .await;
            }
            ButtonAction::CompleteOrder { order_id } => {
                let Some(message_id) = message_id else {
                    return Ok(());
                };
                self.send(
                    chat_id,
                    texts::CONFIRM_COMPLETION,
                    Some(ReplyMarkup::inline(vec![vec![
                        InlineKeyboardButton::callback(
                            "Yes ✅",
                            format!("confirmComplete_{}_{}", order_id, message_id),
                        ),
                        InlineKeyboardButton::callback("No ❌", "cancel"),
                    ]])),
                )
                .await;
            }
            ButtonAction::ConfirmComplete {
                order_id,
                order_message_id,
            } => {
                if !db!(self.ctx.orders.complete_order(order_id))? {
                    self.send(chat_id, texts::ORDER_NOT_FOUND, None).await;
                    return Ok(());
                }
                log::info!("Operator {} completed order {}.", from_id, order_id);

                if let Some(message_id) = message_id {
                    self.delete(chat_id, message_id).await;
                }
                let done = ReplyMarkup::inline(vec![vec![InlineKeyboardButton::callback(
                    "✅ This order has already been fulfilled",
                    "already_completed",
                )]]);
                if let Err(e) = self
                    .ctx
                    .messenger
                    .edit_markup(chat_id, order_message_id, done)
                    .await
                {
                    log::warn!("Failed to disable order {} controls: {}", order_id, e);
                }
                self.send(chat_id, texts::ORDER_COMPLETED, None).await;
            }
            ButtonAction::ConfirmCustomStars { user_id, amount } => {
                self.send(user_id, &texts::purchase_fulfilled(amount), None)
                    .await;
                if let Some(message_id) = message_id {
                    self.delete(chat_id, message_id).await;
                }
            }
            ButtonAction::Cancel => {
                self.send(
                    chat_id,
                    texts::CANCELLED,
                    Some(ReplyMarkup::remove_keyboard()),
                )
                .await;
            }
            ButtonAction::AlreadyCompleted => {}
        }

        Ok(())
    }

    async fn business_hours(&self, chat_id: i64) {
        let now = Utc::now().with_timezone(&self.ctx.store.timezone);
        let (text, markup) = business_hours_reply(&self.ctx.store, now);
        self.send(chat_id, &text, markup).await;
    }

    async fn prompt_for_phone(&self, user_id: i64) {
        self.send(
            user_id,
            texts::SHARE_PHONE,
            Some(ReplyMarkup::request_contact(texts::SHARE_PHONE_BUTTON)),
        )
        .await;
    }

    async fn is_subscribed(&self, user_id: i64) -> bool {
        match self
            .ctx
            .messenger
            .membership_status(user_id, &self.ctx.channel)
            .await
        {
            Ok(status) => status.is_subscribed(),
            Err(e) => {
                log::error!("Failed to check subscription of {}: {}", user_id, e);
                false
            }
        }
    }

    /// Sends a message, logging failures. Returns the message id on success.
    async fn send(&self, chat_id: i64, text: &str, markup: Option<ReplyMarkup>) -> Option<i64> {
        match self.ctx.messenger.send_message(chat_id, text, markup).await {
            Ok(message_id) => Some(message_id),
            Err(e) => {
                log::warn!("Failed to send message to {}: {}", chat_id, e);
                None
            }
        }
    }

    async fn delete(&self, chat_id: i64, message_id: i64) {
        match self.ctx.messenger.delete_message(chat_id, message_id).await {
            Ok(()) => {}
            Err(MessagingError::NotFound) => {
                log::debug!("Message {} in {} was already gone.", message_id, chat_id);
            }
            Err(e) => log::warn!(
                "Failed to delete message {} in {}: {}",
                message_id,
                chat_id,
                e
            ),
        }
    }

    async fn notify_operators(&self, text: &str, markup: Option<ReplyMarkup>) {
        for operator in &self.ctx.operators {
            if let Err(e) = self
                .ctx
                .messenger
                .send_message(*operator, text, markup.clone())
                .await
            {
                log::error!("Failed to notify operator {}: {}", operator, e);
            }
        }
    }
}

fn is_open(hour: u32, opening_hour: u32, closing_hour: u32) -> bool {
    hour >= opening_hour && hour < closing_hour
}

/// Reply to the business hours button for the given store-local time.
fn business_hours_reply(store: &Store, now: DateTime<Tz>) -> (String, Option<ReplyMarkup>) {
    if is_open(now.hour(), store.opening_hour, store.closing_hour) {
        let markup = ReplyMarkup::inline(vec![vec![InlineKeyboardButton::url(
            "🚀 Open Panda Store",
            store.site_url.clone(),
        )]]);
        return (texts::STORE_OPEN.to_string(), Some(markup));
    }

    let local_time = now.format("%I:%M %p").to_string();
    (
        texts::store_closed(&local_time, store.opening_hour, store.closing_hour),
        None,
    )
}

fn normalize_phone(phone_number: &str) -> String {
    let trimmed = phone_number.trim();
    if trimmed.starts_with('+') {
        trimmed.to_string()
    } else {
        format!("+{trimmed}")
    }
}

/// Referral payloads are kept verbatim as long as they fit the column.
fn storable_code(code: &str) -> Option<String> {
    let fits = !code.is_empty() && code.chars().count() <= MAX_STORED_CODE_LEN;
    fits.then(|| code.to_string())
}

fn new_referral_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(REFERRAL_CODE_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

/// Leading integer of free text, ignoring what follows ("60 stars" → 60).
fn parse_leading_int(text: &str) -> Option<i32> {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end].parse::<i32>().ok().map(|n| sign * n)
}
