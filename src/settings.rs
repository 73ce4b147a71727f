use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub bind_addr: String,
    pub admin_tokens: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pix {
    pub url: String,
    pub auth_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub contract: String,
    pub decimals: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Crypto {
    pub gateway_url: String,
    pub gateway_api_key: String,
    pub ipn_secret: String,
    pub deposit_address: String,
    pub explorer_url: String,
    pub explorer_api_key: String,
    pub poll_interval_secs: u64,
    pub invoice_expiry_secs: i64,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ipfs {
    pub url: String,
    pub jwt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Email {
    pub url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Withdrawals {
    pub min_amount_in_cents: i64,
    pub cooldown_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Referrals {
    pub default_commission_bps: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    pub server: Server,
    pub pix: Pix,
    pub crypto: Crypto,
    pub ipfs: Ipfs,
    pub email: Email,
    pub withdrawals: Withdrawals,
    pub referrals: Referrals,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config.toml"))
            .build()?;

        config.try_deserialize()
    }
}
