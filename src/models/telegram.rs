use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Update {
    pub update_id: Option<i64>,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub contact: Option<Contact>,
    pub reply_to_message: Option<Box<Message>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    pub user_id: Option<i64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline(InlineKeyboardMarkup),
    Keyboard(ReplyKeyboardMarkup),
    ForceReply(ForceReply),
    Remove(ReplyKeyboardRemove),
}

impl ReplyMarkup {
    pub fn inline(rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
        ReplyMarkup::Inline(InlineKeyboardMarkup {
            inline_keyboard: rows,
        })
    }

    pub fn request_contact(text: &str) -> Self {
        ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
            keyboard: vec![vec![KeyboardButton {
                text: text.to_string(),
                request_contact: true,
            }]],
            resize_keyboard: true,
            one_time_keyboard: true,
        })
    }

    pub fn force_reply() -> Self {
        ReplyMarkup::ForceReply(ForceReply { force_reply: true })
    }

    pub fn remove_keyboard() -> Self {
        ReplyMarkup::Remove(ReplyKeyboardRemove {
            remove_keyboard: true,
        })
    }

    /// Callback payloads carried by an inline keyboard, row by row.
    pub fn callback_data(&self) -> Vec<&str> {
        match self {
            ReplyMarkup::Inline(markup) => markup
                .inline_keyboard
                .iter()
                .flatten()
                .filter_map(|b| b.callback_data.as_deref())
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_app: Option<WebAppInfo>,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
            web_app: None,
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
            web_app: None,
        }
    }

    pub fn web_app(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: None,
            web_app: Some(WebAppInfo { url: url.into() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WebAppInfo {
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
    pub one_time_keyboard: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
    pub request_contact: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForceReply {
    pub force_reply: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReplyKeyboardRemove {
    pub remove_keyboard: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipStatus {
    Member,
    Admin,
    Owner,
    None,
    Unknown,
}

impl MembershipStatus {
    pub fn from_api(status: &str) -> Self {
        match status {
            "member" => MembershipStatus::Member,
            "administrator" => MembershipStatus::Admin,
            "creator" => MembershipStatus::Owner,
            "left" | "kicked" | "restricted" => MembershipStatus::None,
            _ => MembershipStatus::Unknown,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        matches!(
            self,
            MembershipStatus::Member | MembershipStatus::Admin | MembershipStatus::Owner
        )
    }
}

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ChatMember {
    pub status: String,
}
