//! Swap submission capability.
//!
//! One executor per chain family, selected by the chain tag stored on the
//! intent. Executors return as soon as the transaction is accepted by the
//! network or aggregator; waiting for on-chain finality is traded away for
//! latency, and a best-effort `confirmed` flag records when an executor did
//! observe inclusion.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use thiserror::Error;

use crate::events::ChainFamily;

pub mod jupiter;

/// The acting wallet an executor signs with.
#[derive(Clone)]
pub struct WalletContext {
    pub keypair: Arc<Keypair>,
    pub pubkey: Pubkey,
}

impl WalletContext {
    pub fn new(keypair: Arc<Keypair>) -> Self {
        use solana_sdk::signature::Signer;
        let pubkey = keypair.pubkey();
        Self { keypair, pubkey }
    }
}

/// A ready-to-submit swap request in raw units.
#[derive(Debug, Clone)]
pub struct SwapOrder {
    pub from_asset: Pubkey,
    pub to_asset: Pubkey,
    pub amount_raw: u64,
    pub max_slippage_bps: u16,
    pub priority_fee_lamports: u64,
}

/// Executor result. `confirmed` is best-effort: `false` means submitted and
/// accepted, not yet known to be included.
#[derive(Debug, Clone)]
pub struct SwapReceipt {
    pub tx_hash: String,
    pub output_amount: Option<u64>,
    pub confirmed: bool,
}

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("aggregator quote failed: {0}")]
    Quote(String),
    #[error("aggregator rejected order: {0}")]
    Rejected(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("transaction decode failed: {0}")]
    Decode(String),
    #[error("transaction signing failed: {0}")]
    Signing(String),
    #[error("transaction submission failed: {0}")]
    Submit(String),
    #[error("no executor registered for chain family {0}")]
    UnsupportedChain(&'static str),
}

#[async_trait]
pub trait SwapExecutor: Send + Sync {
    /// Submit a swap order. Must not block past transaction submission.
    async fn execute(
        &self,
        order: &SwapOrder,
        wallet: &WalletContext,
    ) -> Result<SwapReceipt, SwapError>;
}

/// Maps a chain-family tag to its executor. The tag lives on the intent;
/// nothing in the pipeline branches on address formats.
pub struct ExecutorRegistry {
    executors: HashMap<ChainFamily, Arc<dyn SwapExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    pub fn register(&mut self, chain: ChainFamily, executor: Arc<dyn SwapExecutor>) {
        self.executors.insert(chain, executor);
    }

    pub fn get(&self, chain: ChainFamily) -> Result<&Arc<dyn SwapExecutor>, SwapError> {
        self.executors
            .get(&chain)
            .ok_or(SwapError::UnsupportedChain(chain.as_str()))
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
