//! Configuration management for Homeward
//!
//! Loads and validates configuration from environment variables, with support
//! for different environments (development, staging, production).

use homeward_ledger::{
    Address, CancellationPolicy, ConfigError as EscrowConfigError, EscrowConfig, ExcessPolicy,
    SettlementPolicy,
};
use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::auth::is_stellar_address;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";
const DEFAULT_CUSTODY_ADDRESS: &str = "HOMEWARD-ESCROW";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Rate limit: requests per second per IP
    pub rate_limit_rps: u32,

    /// CORS allowed origins, comma separated
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// JWT secret for token signing
    pub jwt_secret: String,

    /// Access token TTL in seconds (default: 900 = 15 minutes)
    pub jwt_access_token_ttl_seconds: i64,

    /// Auth nonce TTL in seconds (default: 300 = 5 minutes)
    pub auth_nonce_ttl_seconds: i64,

    /// Account holding tokens and funds while sales are open
    pub custody_address: String,

    /// Wallet of the seller listing properties
    pub seller_address: String,

    /// Wallet of the inspector
    pub inspector_address: String,

    /// Wallet of the lender
    pub lender_address: String,

    /// How excess funds and forfeited earnest are settled
    pub settlement: SettlementPolicy,

    /// Mint and list the demo properties at startup
    pub seed_demo: bool,

    /// Buyer designated on the demo listings
    pub demo_buyer_address: Option<String>,

    /// Whole tokens credited to the demo buyer and the lender
    pub demo_initial_balance: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| s.parse::<Environment>())
            .unwrap_or(Ok(Environment::Development))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let rate_limit_rps = env::var("RATE_LIMIT_RPS")
            .unwrap_or_else(|_| "100".to_string())
            .parse::<u32>()
            .unwrap_or(100);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if environment.is_production() => {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()))
            }
            Err(_) => DEV_JWT_SECRET.to_string(),
        };

        let jwt_access_token_ttl_seconds = env::var("JWT_ACCESS_TOKEN_TTL_SECONDS")
            .unwrap_or_else(|_| "900".to_string())
            .parse::<i64>()
            .unwrap_or(900);

        let auth_nonce_ttl_seconds = env::var("AUTH_NONCE_TTL_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<i64>()
            .unwrap_or(300);

        let custody_address = env::var("ESCROW_CUSTODY_ADDRESS")
            .unwrap_or_else(|_| DEFAULT_CUSTODY_ADDRESS.to_string());
        let seller_address = required_wallet("SELLER_ADDRESS")?;
        let inspector_address = required_wallet("INSPECTOR_ADDRESS")?;
        let lender_address = required_wallet("LENDER_ADDRESS")?;

        let settlement = SettlementPolicy {
            excess: parse_policy::<ExcessPolicy>("EXCESS_POLICY")?,
            cancellation: parse_policy::<CancellationPolicy>("CANCELLATION_POLICY")?,
        };

        let seed_demo = env::var("SEED_DEMO")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let demo_buyer_address = env::var("DEMO_BUYER_ADDRESS").ok();
        if let Some(buyer) = &demo_buyer_address {
            validate_wallet("DEMO_BUYER_ADDRESS", buyer)?;
        }
        if seed_demo && demo_buyer_address.is_none() {
            return Err(ConfigError::MissingEnvVar("DEMO_BUYER_ADDRESS".to_string()));
        }

        let demo_initial_balance = env::var("DEMO_INITIAL_BALANCE")
            .unwrap_or_else(|_| "100".to_string())
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue("DEMO_INITIAL_BALANCE must be a whole number".to_string())
            })?;

        Ok(Config {
            environment,
            port,
            rate_limit_rps,
            cors_allowed_origins,
            log_level,
            jwt_secret,
            jwt_access_token_ttl_seconds,
            auth_nonce_ttl_seconds,
            custody_address,
            seller_address,
            inspector_address,
            lender_address,
            settlement,
            seed_demo,
            demo_buyer_address,
            demo_initial_balance,
        })
    }

    /// Development faucet and other test conveniences are enabled
    pub fn dev_tools_enabled(&self) -> bool {
        !self.environment.is_production()
    }

    /// Fixed sale parties and settlement rules for the ledger
    pub fn escrow_config(&self) -> Result<EscrowConfig, EscrowConfigError> {
        Ok(EscrowConfig::new(
            Address::new(self.custody_address.as_str()),
            Address::new(self.seller_address.as_str()),
            Address::new(self.inspector_address.as_str()),
            Address::new(self.lender_address.as_str()),
        )?
        .with_settlement(self.settlement))
    }
}

fn required_wallet(name: &str) -> Result<String, ConfigError> {
    let address = env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
    validate_wallet(name, &address)?;
    Ok(address)
}

fn validate_wallet(name: &str, address: &str) -> Result<(), ConfigError> {
    if is_stellar_address(address) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(format!(
            "{} must be a Stellar public key (G...)",
            name
        )))
    }
}

fn parse_policy<P>(name: &str) -> Result<P, ConfigError>
where
    P: FromStr + Default,
    P::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<P>()
            .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", name, e))),
        Err(_) => Ok(P::default()),
    }
}
