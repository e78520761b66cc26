//! Affordability verification: does the acting wallet hold enough of the
//! input asset, plus a native fee buffer, to cover a prospective swap?
//!
//! The check runs before any execution claim is honored with an executor
//! call, and returns a structured shortfall (raw and UI units) so the caller
//! can report actionable detail instead of a bare boolean.

use async_trait::async_trait;
use solana_sdk::native_token::lamports_to_sol;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::parsers::WSOL_MINT;

/// Fee buffer reserved on top of a native-asset swap amount: 0.01 SOL.
pub const DEFAULT_FEE_BUFFER_LAMPORTS: u64 = 10_000_000;

pub const NATIVE_DECIMALS: u8 = 9;

#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("balance query failed: {0}")]
    Query(String),
}

/// Read-only balance capability, one implementation per chain backend.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn native_balance(&self, owner: &Pubkey) -> Result<u64, BalanceError>;

    /// Raw balance of an SPL token, 0 when the token account does not exist.
    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, BalanceError>;
}

/// Outcome of an affordability check. `fee_shortfall` is set when the asset
/// balance was sufficient but the separate native fee buffer was not.
#[derive(Debug, Clone)]
pub struct AffordabilityReport {
    pub sufficient: bool,
    pub fee_shortfall: bool,
    pub asset: Pubkey,
    pub current_raw: u64,
    pub required_raw: u64,
    pub current_ui: f64,
    pub required_ui: f64,
}

impl AffordabilityReport {
    pub fn shortfall_raw(&self) -> u64 {
        self.required_raw.saturating_sub(self.current_raw)
    }
}

pub struct AffordabilityChecker {
    source: std::sync::Arc<dyn BalanceSource>,
    fee_buffer_lamports: u64,
}

impl AffordabilityChecker {
    pub fn new(source: std::sync::Arc<dyn BalanceSource>, fee_buffer_lamports: u64) -> Self {
        Self {
            source,
            fee_buffer_lamports,
        }
    }

    /// Verify `owner` can afford to swap `amount_raw` of `asset`.
    ///
    /// Native asset: required = amount + fee buffer, one query. Other assets:
    /// required = amount, and the native fee buffer is verified separately.
    pub async fn check(
        &self,
        owner: &Pubkey,
        asset: &Pubkey,
        amount_raw: u64,
        decimals: u8,
    ) -> Result<AffordabilityReport, BalanceError> {
        if *asset == WSOL_MINT {
            let current = self.source.native_balance(owner).await?;
            let required = amount_raw.saturating_add(self.fee_buffer_lamports);
            return Ok(AffordabilityReport {
                sufficient: current >= required,
                fee_shortfall: false,
                asset: *asset,
                current_raw: current,
                required_raw: required,
                current_ui: lamports_to_sol(current),
                required_ui: lamports_to_sol(required),
            });
        }

        let current = self.source.token_balance(owner, asset).await?;
        let native = self.source.native_balance(owner).await?;
        let scale = 10u64.pow(u32::from(decimals)) as f64;
        Ok(AffordabilityReport {
            sufficient: current >= amount_raw && native >= self.fee_buffer_lamports,
            fee_shortfall: current >= amount_raw && native < self.fee_buffer_lamports,
            asset: *asset,
            current_raw: current,
            required_raw: amount_raw,
            current_ui: current as f64 / scale,
            required_ui: amount_raw as f64 / scale,
        })
    }
}
