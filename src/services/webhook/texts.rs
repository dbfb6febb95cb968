use crate::models::telegram::{InlineKeyboardButton, ReplyMarkup};

/// Substring the custom-amount reply is recognised by.
pub const CUSTOM_AMOUNT_MARKER: &str = "Enter the number of stars";

pub const CUSTOM_AMOUNT_PROMPT: &str =
    "📝 Enter the number of stars you want to buy (minimum 50):";
pub const GEO_REFUSAL: &str = "⛔ Sorry, we do not serve users from this region.";
pub const SHARE_PHONE: &str = "📱 Please share your phone number to continue:";
pub const SHARE_PHONE_BUTTON: &str = "Share phone number";
pub const OWN_CONTACT_ONLY: &str =
    "❗ Please share your own phone number using the button below.";
pub const SUBSCRIBE_FIRST: &str = "📢 Please join our channel first to use the bot:";
pub const NOT_SUBSCRIBED: &str =
    "❌ You have not joined the channel yet. Join it, then press ✅ I have joined.";
pub const CHALLENGE_INTRO: &str = "🔐 To verify, please tap the emoji:";
pub const CONTACT_CHALLENGE_INTRO: &str =
    "🔐 Thanks for sharing your phone number. To verify, please tap the emoji:";
pub const CHALLENGE_CHOICES: &str = "Pick the requested emoji:";
pub const WRONG_EMOJI: &str = "❌ That is not the right emoji. Please try again.";
pub const NO_ACTIVE_CHALLENGE: &str =
    "❗ There is no pending verification. Send /start to begin.";
pub const PHONE_UPDATED: &str = "✅ Your phone number has been updated.";
pub const REFERRAL_REGISTERED: &str =
    "🎉 You signed up through an invite link! Please complete verification with /start.";
pub const REGISTER_FIRST: &str = "❗ Please finish registering first by sending /start";
pub const INSUFFICIENT_BALANCE: &str =
    "❌ You do not have enough stars. Earn more through the referral program.";
pub const CUSTOM_AMOUNT_MINIMUM: &str =
    "❌ The minimum purchase is 50 stars. Please enter a whole number of 50 or more.";
pub const SUPPORT: &str = "You can reach the store manager here:";
pub const CONSOLE: &str = "Order list:";
pub const CONFIRM_COMPLETION: &str = "Are you sure this order has been fulfilled❓";
pub const ORDER_COMPLETED: &str = "🎉 Order status updated 🎉";
pub const ORDER_NOT_FOUND: &str = "❌ That order no longer exists.";
pub const CANCELLED: &str = "❌ Cancelled";
pub const STORE_OPEN: &str = "✅ The store is open! You can buy stars through the link below:";
pub const SERVICE_UNAVAILABLE: &str =
    "⚠️ The service is temporarily unavailable. Please try again later.";

pub const STORE_NAME: &str = "Panda Store 🐼";

/// Minimum for amounts typed in by the user.
pub const CUSTOM_AMOUNT_MIN: i32 = 50;
pub const FIXED_DENOMINATIONS: [i32; 3] = [15, 25, 50];

pub fn welcome(verified: bool) -> String {
    let greeting = if verified {
        format!("✅ Verification complete! Welcome to {STORE_NAME}")
    } else {
        format!("Welcome to {STORE_NAME}")
    };

    format!(
        "{greeting}\nYou can buy Telegram stars from our official site 🚀\nSend /invite to start earning with the bot"
    )
}

pub fn welcome_markup(proofs_channel_url: &str) -> ReplyMarkup {
    ReplyMarkup::inline(vec![
        vec![InlineKeyboardButton::callback(
            "Check business hours 🚀",
            "check_order_time",
        )],
        vec![InlineKeyboardButton::url(
            "Join the proofs channel",
            proofs_channel_url,
        )],
    ])
}

pub fn join_markup(channel: &str) -> ReplyMarkup {
    ReplyMarkup::inline(vec![
        vec![InlineKeyboardButton::url(
            "Join the channel",
            format!("https://t.me/{channel}"),
        )],
        vec![InlineKeyboardButton::callback(
            "✅ I have joined",
            "check_subscription",
        )],
    ])
}

pub fn support_markup(support_url: &str) -> ReplyMarkup {
    ReplyMarkup::inline(vec![vec![InlineKeyboardButton::url(
        "Contact us 🥰",
        support_url,
    )]])
}

/// Choice keyboard, three symbols per row.
pub fn challenge_markup(symbols: &[String]) -> ReplyMarkup {
    ReplyMarkup::inline(
        symbols
            .chunks(3)
            .map(|row| {
                row.iter()
                    .map(|s| InlineKeyboardButton::callback(s.clone(), format!("verify_{s}")))
                    .collect()
            })
            .collect(),
    )
}

pub fn shop(balance: i32) -> String {
    format!("🛒 Star shop\n\n⭐ Available stars: {balance}")
}

pub fn shop_markup() -> ReplyMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = FIXED_DENOMINATIONS
        .iter()
        .map(|n| {
            vec![InlineKeyboardButton::callback(
                format!("{n} stars"),
                format!("buy_{n}"),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "Enter a custom amount",
        "custom_amount",
    )]);

    ReplyMarkup::inline(rows)
}

pub fn invite(link: &str, invitees: i64, balance: i32) -> String {
    format!(
        "📣 Your invite link:\n{link}\n\n🔢 Referrals: {invitees}\n⭐ Stars earned: {balance}"
    )
}

pub fn purchase_request(username: &str, amount: i32, user_id: i64) -> String {
    format!("🛒 New star purchase request\n👤 User: @{username}\n⭐ Stars: {amount}\n🆔 ID: {user_id}")
}

pub fn purchase_accepted(amount: i32) -> String {
    format!("✅ Your request for {amount} stars was received. You will be notified once it is fulfilled.")
}

pub fn purchase_fulfilled(amount: i32) -> String {
    format!("🎉 Your request for {amount} stars has been fulfilled! Thank you for using {STORE_NAME}.")
}

pub fn store_closed(local_time: &str, opening_hour: u32, closing_hour: u32) -> String {
    format!(
        "❌ Sorry, we are outside business hours right now.\n\n🕘 Business hours: {opening_hour}:00 to {closing_hour}:00 store time.\n\n⏳ Current store time: {local_time}\n\n🔁 Please try again during business hours."
    )
}
