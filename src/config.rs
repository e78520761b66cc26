use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use base64::{engine::general_purpose, Engine as _};
use dotenvy::Error as DotenvError;
use serde::Deserialize;
use solana_sdk::{
    native_token::sol_to_lamports,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use thiserror::Error;

use crate::store::TriggerCondition;

const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 10_000;
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 30;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 15;
const DEFAULT_DEDUP_TTL_SECS: u64 = 300;
const DEFAULT_DEDUP_SWEEP_SECS: u64 = 60;
const DEFAULT_FEE_BUFFER_SOL: f64 = 0.01;
const DEFAULT_COPY_SLIPPAGE_BPS: u16 = 100;
const DEFAULT_SNIPE_SLIPPAGE_BPS: u16 = 100;

#[derive(Clone)]
pub struct Config {
    pub env_path: PathBuf,
    pub operator: Arc<Keypair>,
    pub rpc_url: String,
    pub ws_url: Option<String>,
    pub jupiter_base_url: Option<String>,
    pub price_api_url: Option<String>,
    pub poll_interval: Duration,
    pub sweep_interval: Duration,
    pub reconcile_interval: Duration,
    pub call_timeout: Duration,
    pub dedup_ttl: Duration,
    pub dedup_sweep: Duration,
    pub fee_buffer_sol: f64,
    pub copy_buy_amount_sol: f64,
    pub copy_slippage_bps: u16,
    pub tracked_wallets: Vec<TrackedWalletConfig>,
    pub snipe_targets: Vec<SnipeTargetConfig>,
    /// Programs to watch, from `WATCH_PROGRAM_{n}`. Empty means every
    /// program with a registered parser.
    pub watch_programs: Vec<Pubkey>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let env_path = env::current_dir()
            .map_err(|e| ConfigError::Io("current_dir".into(), e))?
            .join(".env");

        match dotenvy::from_path(&env_path) {
            Ok(_) => {}
            Err(DotenvError::LineParse(_, _)) | Err(DotenvError::Io(_)) if env_path.exists() => {
                return Err(ConfigError::Dotenv)
            }
            Err(_) => {
                return Err(ConfigError::MissingEnv(env_path));
            }
        }

        let raw = RawConfig::gather()?;

        let operator = Arc::new(parse_keypair(&raw.private_key)?);
        let tracked_wallets = load_tracked_wallets()?;
        let snipe_targets = load_snipe_targets()?;
        let watch_programs = load_watch_programs()?;

        Ok(Self {
            env_path,
            operator,
            rpc_url: raw.rpc_url,
            ws_url: raw.ws_url,
            jupiter_base_url: raw.jupiter_base_url,
            price_api_url: raw.price_api_url,
            poll_interval: Duration::from_millis(
                raw.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            sweep_interval: Duration::from_millis(
                raw.sweep_interval_ms.unwrap_or(DEFAULT_SWEEP_INTERVAL_MS),
            ),
            reconcile_interval: Duration::from_secs(
                raw.reconcile_interval_secs
                    .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECS),
            ),
            call_timeout: Duration::from_secs(
                raw.call_timeout_secs.unwrap_or(DEFAULT_CALL_TIMEOUT_SECS),
            ),
            dedup_ttl: Duration::from_secs(raw.dedup_ttl_secs.unwrap_or(DEFAULT_DEDUP_TTL_SECS)),
            dedup_sweep: Duration::from_secs(
                raw.dedup_sweep_secs.unwrap_or(DEFAULT_DEDUP_SWEEP_SECS),
            ),
            fee_buffer_sol: raw.fee_buffer_sol.unwrap_or(DEFAULT_FEE_BUFFER_SOL),
            copy_buy_amount_sol: raw.copy_buy_amount_sol,
            copy_slippage_bps: raw
                .copy_slippage_bps
                .map(to_u16)
                .transpose()?
                .unwrap_or(DEFAULT_COPY_SLIPPAGE_BPS),
            tracked_wallets,
            snipe_targets,
            watch_programs,
        })
    }

    pub fn operator_pubkey(&self) -> Pubkey {
        self.operator.pubkey()
    }

    pub fn operator_keypair(&self) -> Arc<Keypair> {
        Arc::clone(&self.operator)
    }

    pub fn fee_buffer_lamports(&self) -> u64 {
        sol_to_lamports(self.fee_buffer_sol.max(0.0))
    }
}

fn to_u16(value: u64) -> Result<u16, ConfigError> {
    u16::try_from(value).map_err(|_| ConfigError::InvalidSlippage(value.to_string()))
}

/// One wallet to mirror, from the `TRACKED_WALLET_{n}` family.
#[derive(Clone, Debug)]
pub struct TrackedWalletConfig {
    pub wallet: Pubkey,
    pub label: Option<String>,
}

/// One standing snipe, from the `SNIPE_TOKEN_{n}` family.
#[derive(Clone, Debug)]
pub struct SnipeTargetConfig {
    pub token: Pubkey,
    pub amount_sol: f64,
    pub slippage_bps: u16,
    pub priority_fee_sol: f64,
    pub trigger: TriggerCondition,
    pub min_liquidity_usd: Option<f64>,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(rename = "PRIVATE_KEY")]
    private_key: String,
    #[serde(rename = "RPC_URL")]
    rpc_url: String,
    #[serde(rename = "WS_URL", default, deserialize_with = "de_optional_string")]
    ws_url: Option<String>,
    #[serde(
        rename = "JUPITER_BASE_URL",
        default,
        deserialize_with = "de_optional_string"
    )]
    jupiter_base_url: Option<String>,
    #[serde(
        rename = "PRICE_API_URL",
        default,
        deserialize_with = "de_optional_string"
    )]
    price_api_url: Option<String>,
    #[serde(
        rename = "POLL_INTERVAL_MS",
        default,
        deserialize_with = "de_optional_u64"
    )]
    poll_interval_ms: Option<u64>,
    #[serde(
        rename = "SWEEP_INTERVAL_MS",
        default,
        deserialize_with = "de_optional_u64"
    )]
    sweep_interval_ms: Option<u64>,
    #[serde(
        rename = "RECONCILE_INTERVAL_SECS",
        default,
        deserialize_with = "de_optional_u64"
    )]
    reconcile_interval_secs: Option<u64>,
    #[serde(
        rename = "CALL_TIMEOUT_SECS",
        default,
        deserialize_with = "de_optional_u64"
    )]
    call_timeout_secs: Option<u64>,
    #[serde(
        rename = "DEDUP_TTL_SECS",
        default,
        deserialize_with = "de_optional_u64"
    )]
    dedup_ttl_secs: Option<u64>,
    #[serde(
        rename = "DEDUP_SWEEP_SECS",
        default,
        deserialize_with = "de_optional_u64"
    )]
    dedup_sweep_secs: Option<u64>,
    #[serde(
        rename = "FEE_BUFFER_SOL",
        default,
        deserialize_with = "de_optional_f64"
    )]
    fee_buffer_sol: Option<f64>,
    #[serde(rename = "COPY_BUY_AMOUNT_SOL", deserialize_with = "de_f64")]
    copy_buy_amount_sol: f64,
    #[serde(
        rename = "COPY_SLIPPAGE_BPS",
        default,
        deserialize_with = "de_optional_u64"
    )]
    copy_slippage_bps: Option<u64>,
}

impl RawConfig {
    fn gather() -> Result<Self, ConfigError> {
        let mut data = std::collections::BTreeMap::new();
        for (key, value) in env::vars() {
            data.insert(key, value);
        }
        let json = serde_json::to_value(&data).map_err(|e| ConfigError::Serde(e.to_string()))?;
        serde_json::from_value(json).map_err(|e| ConfigError::Serde(e.to_string()))
    }
}

fn parse_keypair(encoded: &str) -> Result<Keypair, ConfigError> {
    let trimmed = encoded.trim();

    if let Ok(bytes) = bs58::decode(trimmed).into_vec() {
        if let Ok(kp) = Keypair::from_bytes(&bytes) {
            return Ok(kp);
        }
    }

    if let Ok(bytes) = general_purpose::STANDARD.decode(trimmed.as_bytes()) {
        if let Ok(kp) = Keypair::from_bytes(&bytes) {
            return Ok(kp);
        }
    }

    if trimmed.starts_with('[') {
        if let Ok(vec) = serde_json::from_str::<Vec<u8>>(trimmed) {
            if let Ok(kp) = Keypair::from_bytes(&vec) {
                return Ok(kp);
            }
        }
    }

    Err(ConfigError::InvalidPrivateKey)
}

fn parse_trigger(key: &str, raw: &str) -> Result<TriggerCondition, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "immediate" => Ok(TriggerCondition::Immediate),
        "liquidity" | "liquidity_added" => Ok(TriggerCondition::LiquidityAdded),
        _ => Err(ConfigError::InvalidTrigger {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn de_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| serde::de::Error::custom("expected number"))
}

fn de_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    }))
}

fn de_optional_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(serde::de::Error::custom("expected number"));
        }
        trimmed
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom("expected number"))
    })
    .transpose()
}

fn de_optional_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(serde::de::Error::custom("expected integer"));
        }
        trimmed
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom("expected integer"))
    })
    .transpose()
}

fn load_tracked_wallets() -> Result<Vec<TrackedWalletConfig>, ConfigError> {
    let mut wallets = Vec::new();
    let mut index = 1;

    loop {
        let wallet_key = format!("TRACKED_WALLET_{index}");
        let wallet_value = match env::var(&wallet_key) {
            Ok(value) => value,
            Err(env::VarError::NotPresent) => break,
            Err(err) => return Err(ConfigError::EnvVar(wallet_key, err)),
        };
        let wallet = Pubkey::from_str(wallet_value.trim())
            .map_err(|e| ConfigError::Pubkey(wallet_value.clone(), e))?;

        let label_key = format!("{wallet_key}_LABEL");
        let label = match env::var(&label_key) {
            Ok(value) if !value.trim().is_empty() => Some(value.trim().to_owned()),
            Ok(_) | Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(ConfigError::EnvVar(label_key, err)),
        };

        wallets.push(TrackedWalletConfig { wallet, label });
        index += 1;
    }

    Ok(wallets)
}

fn load_watch_programs() -> Result<Vec<Pubkey>, ConfigError> {
    let mut programs = Vec::new();
    let mut index = 1;

    loop {
        let key = format!("WATCH_PROGRAM_{index}");
        let value = match env::var(&key) {
            Ok(value) => value,
            Err(env::VarError::NotPresent) => break,
            Err(err) => return Err(ConfigError::EnvVar(key, err)),
        };
        let program = Pubkey::from_str(value.trim())
            .map_err(|e| ConfigError::Pubkey(value.clone(), e))?;
        if !programs.contains(&program) {
            programs.push(program);
        }
        index += 1;
    }

    Ok(programs)
}

fn load_snipe_targets() -> Result<Vec<SnipeTargetConfig>, ConfigError> {
    let mut targets = Vec::new();
    let mut index = 1;

    loop {
        let token_key = format!("SNIPE_TOKEN_{index}");
        let token_value = match env::var(&token_key) {
            Ok(value) => value,
            Err(env::VarError::NotPresent) => break,
            Err(err) => return Err(ConfigError::EnvVar(token_key, err)),
        };
        let token = Pubkey::from_str(token_value.trim())
            .map_err(|e| ConfigError::Pubkey(token_value.clone(), e))?;

        let amount_key = format!("{token_key}_AMOUNT_SOL");
        let amount_value = match env::var(&amount_key) {
            Ok(value) => value,
            Err(env::VarError::NotPresent) => {
                return Err(ConfigError::MissingTargetField(amount_key));
            }
            Err(err) => return Err(ConfigError::EnvVar(amount_key, err)),
        };
        let amount_sol = amount_value
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidAmount(amount_value.clone()))?;

        let slippage_key = format!("{token_key}_SLIPPAGE_BPS");
        let slippage_bps = match env::var(&slippage_key) {
            Ok(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidSlippage(value.clone()))?,
            Err(env::VarError::NotPresent) => DEFAULT_SNIPE_SLIPPAGE_BPS,
            Err(err) => return Err(ConfigError::EnvVar(slippage_key, err)),
        };

        let fee_key = format!("{token_key}_PRIORITY_FEE_SOL");
        let priority_fee_sol = match env::var(&fee_key) {
            Ok(value) => value
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::InvalidAmount(value.clone()))?,
            Err(env::VarError::NotPresent) => 0.0,
            Err(err) => return Err(ConfigError::EnvVar(fee_key, err)),
        };

        let trigger_key = format!("{token_key}_TRIGGER");
        let trigger = match env::var(&trigger_key) {
            Ok(value) => parse_trigger(&trigger_key, &value)?,
            Err(env::VarError::NotPresent) => TriggerCondition::Immediate,
            Err(err) => return Err(ConfigError::EnvVar(trigger_key, err)),
        };

        let liquidity_key = format!("{token_key}_MIN_LIQUIDITY_USD");
        let min_liquidity_usd = match env::var(&liquidity_key) {
            Ok(value) if !value.trim().is_empty() => Some(
                value
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ConfigError::InvalidAmount(value.clone()))?,
            ),
            Ok(_) | Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(ConfigError::EnvVar(liquidity_key, err)),
        };

        targets.push(SnipeTargetConfig {
            token,
            amount_sol,
            slippage_bps,
            priority_fee_sol,
            trigger,
            min_liquidity_usd,
        });
        index += 1;
    }

    Ok(targets)
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine working directory for {0}")]
    Io(String, #[source] std::io::Error),
    #[error("missing .env at {0}")]
    MissingEnv(PathBuf),
    #[error("failed to parse .env file")]
    Dotenv,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("pubkey parse error for {0}")]
    Pubkey(String, #[source] solana_sdk::pubkey::ParsePubkeyError),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("env var {0} error")]
    EnvVar(String, env::VarError),
    #[error("missing snipe target field {0}")]
    MissingTargetField(String),
    #[error("invalid slippage value: {0}")]
    InvalidSlippage(String),
    #[error("invalid amount value: {0}")]
    InvalidAmount(String),
    #[error("invalid trigger value {value} for {key}")]
    InvalidTrigger { key: String, value: String },
}

impl ConfigError {
    pub fn missing_env_path(&self) -> Option<&Path> {
        match self {
            ConfigError::MissingEnv(path) => Some(path.as_path()),
            _ => None,
        }
    }
}
