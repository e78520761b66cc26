use solana_sdk::{pubkey, pubkey::Pubkey};
use std::fmt::Debug;
use thiserror::Error;

use crate::events::{ChainEvent, TokenEvent};

pub mod orca;
pub mod raydium;

/// Result type for parser operations
pub type ParserResult<T> = Result<T, ParserError>;

/// Error types for parsing operations. Absence of a recognizable pool/swap
/// pattern is *not* an error (parsers return `Ok(None)` for that); these
/// cover genuinely malformed input.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Event has no log lines")]
    EmptyLogs,
}

/// Trait that all pool parsers must implement.
///
/// Parsing is two-phase so the event source can avoid paying for transaction
/// enrichment on the vast majority of uninteresting events:
/// 1. [`PoolParser::matches_logs`] is a cheap marker scan over raw log lines.
/// 2. [`PoolParser::parse`] runs the full extraction against an enriched
///    [`ChainEvent`] and is deterministic: the same event always yields the
///    same [`TokenEvent`] (or the same absence).
pub trait PoolParser: Send + Sync + Debug {
    /// Get the program ID this parser handles
    fn program_id(&self) -> Pubkey;

    /// Cheap prefilter: do these raw log lines look like a pool creation?
    fn matches_logs(&self, log_lines: &[String]) -> bool;

    /// Extract a [`TokenEvent`] from an enriched event.
    ///
    /// # Returns
    /// * `Ok(Some(event))` - recognizable pool creation, token hint extracted
    /// * `Ok(None)` - no recognizable pattern (expected for most events)
    /// * `Err(e)` - malformed input
    fn parse(&self, event: &ChainEvent) -> ParserResult<Option<TokenEvent>>;
}

// Addresses that can never be a freshly-pooled token mint. The heuristic in
// `select_token_mint` skips these when scanning account keys.
const SYSTEM_PROGRAM: Pubkey = pubkey!("11111111111111111111111111111111");
const TOKEN_PROGRAM: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
const TOKEN_2022_PROGRAM: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");
const ATA_PROGRAM: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");
const COMPUTE_BUDGET_PROGRAM: Pubkey = pubkey!("ComputeBudget111111111111111111111111111111");
const RENT_SYSVAR: Pubkey = pubkey!("SysvarRent111111111111111111111111111111111");
const CLOCK_SYSVAR: Pubkey = pubkey!("SysvarC1ock11111111111111111111111111111111");

/// Wrapped SOL mint address.
pub const WSOL_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");

/// True if `key` is a well-known program/sysvar/native address that cannot be
/// a new token mint.
pub fn is_known_program_address(key: &Pubkey) -> bool {
    *key == SYSTEM_PROGRAM
        || *key == TOKEN_PROGRAM
        || *key == TOKEN_2022_PROGRAM
        || *key == ATA_PROGRAM
        || *key == COMPUTE_BUDGET_PROGRAM
        || *key == RENT_SYSVAR
        || *key == CLOCK_SYSVAR
        || *key == WSOL_MINT
}

/// Token-mint selection heuristic shared by the pool parsers: the
/// lowest-index account key that is neither a known system/program address
/// nor the DEX program itself. Index 0 (the fee payer) is skipped.
///
/// This is a documented heuristic with a known false-positive rate, not a
/// guarantee; replacing it with precise instruction-layout decoding only
/// touches this function and the parsers above it.
pub fn select_token_mint(account_keys: &[Pubkey], dex_program: &Pubkey) -> Option<Pubkey> {
    account_keys
        .iter()
        .skip(1)
        .find(|key| !is_known_program_address(key) && *key != dex_program)
        .copied()
}

/// Case-sensitive marker scan over raw log lines.
pub fn logs_contain_marker(log_lines: &[String], markers: &[&str]) -> bool {
    log_lines
        .iter()
        .any(|line| markers.iter().any(|marker| line.contains(marker)))
}
