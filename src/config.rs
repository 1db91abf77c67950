use anyhow::{bail, Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub twitch: TwitchConfig,
    pub market: MarketConfig,
    pub server: ServerConfig,
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct TwitchConfig {
    pub bot_username: String,
    pub oauth_token: String,
    pub channel: String,
    pub client_id: String,
    pub client_secret: String,
    pub liveness_poll_secs: u64,
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub up_keyword: String,
    pub down_keyword: String,
    pub tick_interval: Duration,
    pub initial_price: f64,
    pub floor_price: f64,
    pub volatility_factor: f64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub database_path: String,
    pub allowed_origins: Vec<String>,
}

/// Parse a duration string like "30s", "2m" or "1h" into a `Duration`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    if s.len() < 2 {
        bail!("invalid duration '{}': expected format like '30s'", s);
    }

    let (num_str, suffix) = s.split_at(s.len() - 1);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid duration '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid duration '{}': quantity must be > 0", s);
    }

    let unit_secs = match suffix {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        _ => bail!(
            "invalid duration '{}': unsupported suffix '{}', expected one of s/m/h",
            s,
            suffix
        ),
    };

    let secs = n
        .checked_mul(unit_secs)
        .with_context(|| format!("invalid duration '{}': value is too large", s))?;
    Ok(Duration::from_secs(secs))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let twitch = TwitchConfig {
            bot_username: std::env::var("TWITCH_BOT_USERNAME")
                .context("TWITCH_BOT_USERNAME not set in .env or environment")?,
            oauth_token: std::env::var("TWITCH_OAUTH_TOKEN")
                .context("TWITCH_OAUTH_TOKEN not set in .env or environment")?,
            channel: std::env::var("TWITCH_CHANNEL")
                .context("TWITCH_CHANNEL not set in .env or environment")?
                .to_lowercase(),
            client_id: std::env::var("TWITCH_CLIENT_ID")
                .context("TWITCH_CLIENT_ID not set in .env or environment")?,
            client_secret: std::env::var("TWITCH_CLIENT_SECRET")
                .context("TWITCH_CLIENT_SECRET not set in .env or environment")?,
            liveness_poll_secs: env_parse("LIVENESS_POLL_SECS", 180)?,
        };

        let market = MarketConfig {
            up_keyword: env_or("UP_KEYWORD", "STONKS"),
            down_keyword: env_or("DOWN_KEYWORD", "STONKS DOWN"),
            tick_interval: parse_duration(&env_or("TICK_INTERVAL", "30s"))
                .context("TICK_INTERVAL is invalid")?,
            initial_price: env_parse("INITIAL_PRICE", 100.0)?,
            floor_price: env_parse("FLOOR_PRICE", 1.0)?,
            volatility_factor: env_parse("VOLATILITY_FACTOR", 0.1)?,
        };

        let server = ServerConfig {
            listen_addr: env_or("LISTEN_ADDR", "0.0.0.0:8000"),
            database_path: env_or("DATABASE_PATH", "data/ticks.sqlite"),
            allowed_origins: split_origins(&env_or("ALLOWED_ORIGINS", "")),
        };

        let config = Config {
            twitch,
            market,
            server,
            log_level: env_or("LOG_LEVEL", "info"),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.twitch.channel.trim().is_empty() {
            bail!("TWITCH_CHANNEL must not be empty");
        }
        if self.market.up_keyword.trim().is_empty() || self.market.down_keyword.trim().is_empty() {
            bail!("UP_KEYWORD and DOWN_KEYWORD must not be empty");
        }
        if self.market.floor_price <= 0.0 {
            bail!("FLOOR_PRICE must be > 0");
        }
        if self.market.initial_price < self.market.floor_price {
            bail!("INITIAL_PRICE must be >= FLOOR_PRICE");
        }
        if self.market.volatility_factor < 0.0 {
            bail!("VOLATILITY_FACTOR must be >= 0");
        }
        Ok(())
    }
}
