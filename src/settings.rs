use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Telegram {
    pub token: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub webhook_url: Option<String>,
    pub channel: String,
    pub bot_username: String,
}

impl Telegram {
    /// Channel handle without the leading `@`.
    pub fn channel_handle(&self) -> &str {
        self.channel.trim_start_matches('@')
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Operators {
    #[serde(default)]
    pub ids: Vec<i64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Http {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Store {
    pub site_url: String,
    pub proofs_channel_url: String,
    pub support_url: String,
    pub console_url: String,
    #[serde(default = "default_fragment_stars_url")]
    pub fragment_stars_url: String,
    #[serde(default = "default_fragment_premium_url")]
    pub fragment_premium_url: String,
    /// IANA name; an unknown zone fails loading.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    #[serde(default = "default_opening_hour")]
    pub opening_hour: u32,
    #[serde(default = "default_closing_hour")]
    pub closing_hour: u32,
    #[serde(default = "default_blocked_language_codes")]
    pub blocked_language_codes: Vec<String>,
    #[serde(default = "default_blocked_phone_prefixes")]
    pub blocked_phone_prefixes: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    pub telegram: Telegram,
    #[serde(default)]
    pub operators: Operators,
    pub http: Http,
    pub store: Store,
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("STORE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("operators.ids")
                    .with_list_parse_key("http.allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_fragment_stars_url() -> String {
    "https://fragment.com/stars/buy".to_string()
}

fn default_fragment_premium_url() -> String {
    "https://fragment.com/premium/gift".to_string()
}

fn default_timezone() -> Tz {
    chrono_tz::Africa::Cairo
}

fn default_opening_hour() -> u32 {
    8
}

fn default_closing_hour() -> u32 {
    24
}

fn default_blocked_language_codes() -> Vec<String> {
    vec!["ru".to_string()]
}

fn default_blocked_phone_prefixes() -> Vec<String> {
    vec!["+7".to_string()]
}
