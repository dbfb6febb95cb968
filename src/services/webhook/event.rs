//! Turns a raw bot update into exactly one [`Event`].
//!
//! Rules are checked in priority order and the first match wins, so an
//! update never reaches more than one flow.

use crate::models::telegram::{CallbackQuery, Message, Update};

use super::texts::CUSTOM_AMOUNT_MARKER;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    GeoBlocked {
        chat_id: i64,
    },
    SubscriptionCheck {
        user_id: i64,
    },
    /// `/start`, `/shop` or `/invite`, still behind the membership gate.
    EntryCommand {
        user_id: i64,
        command: EntryCommand,
    },
    RegistrationStart {
        user_id: i64,
    },
    ChallengeAnswer {
        user_id: i64,
        message_id: Option<i64>,
        selected: String,
    },
    ContactShared {
        user_id: i64,
        username: Option<String>,
        phone_number: String,
    },
    /// A contact card that does not belong to the sender.
    ForeignContact {
        user_id: i64,
    },
    ReferralStart {
        user_id: i64,
        username: Option<String>,
        code: String,
    },
    InviteCommand {
        user_id: i64,
    },
    ShopCommand {
        user_id: i64,
    },
    BuyFixed {
        user_id: i64,
        username: Option<String>,
        amount: i32,
    },
    BuyCustomAmount {
        user_id: i64,
        username: Option<String>,
        text: String,
    },
    StaticCommand {
        chat_id: i64,
        command: StaticCommand,
    },
    ButtonAction {
        chat_id: i64,
        message_id: Option<i64>,
        from_id: i64,
        action: ButtonAction,
    },
    Unhandled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryCommand {
    Start,
    Shop,
    Invite,
}

impl EntryCommand {
    /// The flow this command leads to once the gate lets it through.
    pub fn resolve(self, user_id: i64) -> Event {
        match self {
            EntryCommand::Start => Event::RegistrationStart { user_id },
            EntryCommand::Shop => Event::ShopCommand { user_id },
            EntryCommand::Invite => Event::InviteCommand { user_id },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaticCommand {
    Help,
    Database,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    BusinessHours,
    ContactOperator,
    CustomAmountPrompt,
    CompleteOrder { order_id: i32 },
    ConfirmComplete { order_id: i32, order_message_id: i64 },
    ConfirmCustomStars { user_id: i64, amount: i32 },
    Cancel,
    AlreadyCompleted,
}

impl ButtonAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "check_order_time" => return Some(ButtonAction::BusinessHours),
            "contact_admin" => return Some(ButtonAction::ContactOperator),
            "custom_amount" => return Some(ButtonAction::CustomAmountPrompt),
            "cancel" => return Some(ButtonAction::Cancel),
            "already_completed" => return Some(ButtonAction::AlreadyCompleted),
            _ => {}
        }

        if let Some(rest) = data.strip_prefix("confirmComplete_") {
            let (order_id, message_id) = rest.split_once('_')?;
            return Some(ButtonAction::ConfirmComplete {
                order_id: order_id.parse().ok()?,
                order_message_id: message_id.parse().ok()?,
            });
        }

        if let Some(rest) = data.strip_prefix("confirm_stars_") {
            let (user_id, amount) = rest.split_once('_')?;
            return Some(ButtonAction::ConfirmCustomStars {
                user_id: user_id.parse().ok()?,
                amount: amount.parse().ok()?,
            });
        }

        if let Some(order_id) = data.strip_prefix("complete_") {
            return Some(ButtonAction::CompleteOrder {
                order_id: order_id.parse().ok()?,
            });
        }

        None
    }

    /// Actions that change orders or message buyers on an operator's behalf.
    pub fn operator_only(&self) -> bool {
        matches!(
            self,
            ButtonAction::CompleteOrder { .. }
                | ButtonAction::ConfirmComplete { .. }
                | ButtonAction::ConfirmCustomStars { .. }
        )
    }
}

impl Event {
    /// Chat that should hear about a failure while handling this event.
    pub fn reply_chat(&self) -> Option<i64> {
        match self {
            Event::GeoBlocked { chat_id }
            | Event::StaticCommand { chat_id, .. }
            | Event::ButtonAction { chat_id, .. } => Some(*chat_id),
            Event::SubscriptionCheck { user_id }
            | Event::EntryCommand { user_id, .. }
            | Event::RegistrationStart { user_id }
            | Event::ChallengeAnswer { user_id, .. }
            | Event::ContactShared { user_id, .. }
            | Event::ForeignContact { user_id }
            | Event::ReferralStart { user_id, .. }
            | Event::InviteCommand { user_id }
            | Event::ShopCommand { user_id }
            | Event::BuyFixed { user_id, .. }
            | Event::BuyCustomAmount { user_id, .. } => Some(*user_id),
            Event::Unhandled => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::GeoBlocked { .. } => "geo_blocked",
            Event::SubscriptionCheck { .. } => "subscription_check",
            Event::EntryCommand { .. } => "entry_command",
            Event::RegistrationStart { .. } => "registration_start",
            Event::ChallengeAnswer { .. } => "challenge_answer",
            Event::ContactShared { .. } => "contact_shared",
            Event::ForeignContact { .. } => "foreign_contact",
            Event::ReferralStart { .. } => "referral_start",
            Event::InviteCommand { .. } => "invite_command",
            Event::ShopCommand { .. } => "shop_command",
            Event::BuyFixed { .. } => "buy_fixed",
            Event::BuyCustomAmount { .. } => "buy_custom_amount",
            Event::StaticCommand { .. } => "static_command",
            Event::ButtonAction { .. } => "button_action",
            Event::Unhandled => "unhandled",
        }
    }
}

pub fn classify(update: &Update, blocked_language_codes: &[String]) -> Event {
    if let Some(message) = &update.message {
        let blocked = message
            .from
            .as_ref()
            .and_then(|from| from.language_code.as_deref())
            .is_some_and(|code| blocked_language_codes.iter().any(|b| b == code));
        if blocked {
            return Event::GeoBlocked {
                chat_id: message.chat.id,
            };
        }
    }

    if let Some(callback) = &update.callback_query {
        return classify_callback(callback);
    }

    match &update.message {
        Some(message) => classify_message(message),
        None => Event::Unhandled,
    }
}

fn classify_callback(callback: &CallbackQuery) -> Event {
    let Some(data) = callback.data.as_deref() else {
        return Event::Unhandled;
    };
    let user_id = callback.from.id;
    let username = callback.from.username.clone();
    let message_id = callback.message.as_ref().map(|m| m.message_id);

    if data == "check_subscription" {
        return Event::SubscriptionCheck { user_id };
    }

    if let Some(selected) = data.strip_prefix("verify_") {
        // Older keyboards appended the target after a second underscore.
        let selected = selected.split('_').next().unwrap_or_default();
        return Event::ChallengeAnswer {
            user_id,
            message_id,
            selected: selected.to_string(),
        };
    }

    if let Some(amount) = data.strip_prefix("buy_") {
        return match amount.parse::<i32>() {
            Ok(amount) if amount > 0 => Event::BuyFixed {
                user_id,
                username,
                amount,
            },
            _ => Event::Unhandled,
        };
    }

    match ButtonAction::parse(data) {
        Some(action) => Event::ButtonAction {
            chat_id: callback
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(user_id),
            message_id,
            from_id: user_id,
            action,
        },
        None => Event::Unhandled,
    }
}

fn classify_message(message: &Message) -> Event {
    let from = message.from.as_ref();
    let user_id = from.map(|f| f.id).unwrap_or(message.chat.id);
    let username = from.and_then(|f| f.username.clone());
    let text = message.text.as_deref().map(str::trim);

    let entry = match text {
        Some("/start") => Some(EntryCommand::Start),
        Some("/shop") => Some(EntryCommand::Shop),
        Some("/invite") => Some(EntryCommand::Invite),
        _ => None,
    };
    if let Some(command) = entry {
        return Event::EntryCommand { user_id, command };
    }

    if let Some(contact) = &message.contact {
        if contact.user_id != Some(user_id) {
            return Event::ForeignContact { user_id };
        }
        return Event::ContactShared {
            user_id,
            username,
            phone_number: contact.phone_number.clone(),
        };
    }

    if let Some(payload) = text.and_then(|t| t.strip_prefix("/start ")) {
        if let Some(code) = payload.split_whitespace().next() {
            return Event::ReferralStart {
                user_id,
                username,
                code: code.to_string(),
            };
        }
    }

    let replies_to_prompt = message
        .reply_to_message
        .as_ref()
        .and_then(|m| m.text.as_deref())
        .is_some_and(|t| t.contains(CUSTOM_AMOUNT_MARKER));
    if replies_to_prompt {
        return Event::BuyCustomAmount {
            user_id,
            username,
            text: text.unwrap_or_default().to_string(),
        };
    }

    match text {
        Some("/help") => Event::StaticCommand {
            chat_id: message.chat.id,
            command: StaticCommand::Help,
        },
        Some("/database") => Event::StaticCommand {
            chat_id: message.chat.id,
            command: StaticCommand::Database,
        },
        _ => Event::Unhandled,
    }
}
