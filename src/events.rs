use std::time::Instant;

use solana_sdk::pubkey::Pubkey;

/// Which chain family an intent executes on. Stored on the intent and used to
/// select the swap executor, instead of guessing from address formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Solana,
    Evm,
}

impl ChainFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainFamily::Solana => "solana",
            ChainFamily::Evm => "evm",
        }
    }
}

/// DEX program a pool event was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DexKind {
    Raydium,
    Orca,
    /// Synthetic detections whose tradability was established through an
    /// aggregator route rather than an observed pool creation.
    Aggregator,
}

impl DexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DexKind::Raydium => "raydium",
            DexKind::Orca => "orca",
            DexKind::Aggregator => "aggregator",
        }
    }
}

/// A raw notification from the chain data source, normalized across push and
/// pull delivery. Identity is the transaction signature; the dedup cache keys
/// on it.
///
/// `account_keys` and `fee_payer` are enrichment the source adapter fills in
/// from the fetched transaction. They may be empty when enrichment failed;
/// parsers must tolerate that.
#[derive(Debug, Clone)]
pub struct ChainEvent {
    /// Transaction signature, base58.
    pub id: String,
    /// Watched program this event was delivered for.
    pub program_id: Pubkey,
    pub log_lines: Vec<String>,
    /// Static account keys of the transaction, in message order.
    pub account_keys: Vec<Pubkey>,
    /// First signer of the transaction, when known.
    pub fee_payer: Option<Pubkey>,
    pub observed_at: Instant,
}

impl ChainEvent {
    pub fn new(
        id: String,
        program_id: Pubkey,
        log_lines: Vec<String>,
        account_keys: Vec<Pubkey>,
        fee_payer: Option<Pubkey>,
    ) -> Self {
        Self {
            id,
            program_id,
            log_lines,
            account_keys,
            fee_payer,
            observed_at: Instant::now(),
        }
    }
}

/// Structured pool/swap detection derived from a [`ChainEvent`]. Ephemeral:
/// produced by the parser, consumed by matching, never persisted.
///
/// `token_address` is a heuristic hint (see the parser module); downstream
/// validation is required when precision matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEvent {
    pub token_address: Pubkey,
    pub pool_address: Pubkey,
    pub dex: DexKind,
    /// Wallet on the other side of the observed transaction (the fee payer).
    /// Used by copy-trade matching.
    pub counterpart_wallet: Option<Pubkey>,
    pub detected_at: Instant,
    pub source_event_id: String,
}
