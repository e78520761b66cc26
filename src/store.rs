//! Persisted intents (snipe targets, tracked wallets) and execution audit
//! records, behind an abstract store.
//!
//! The store's one load-bearing primitive is
//! [`IntentStore::compare_and_set_status`]: a genuinely atomic conditional
//! update, the sole synchronization point that prevents double execution
//! under concurrent event delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Instant, SystemTime};

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::events::ChainFamily;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("target {0} not found")]
    TargetNotFound(u64),
    #[error("execution {0} not found")]
    ExecutionNotFound(u64),
    #[error("owner {owner_id} already has an open target for token {token}")]
    DuplicateTarget { owner_id: i64, token: Pubkey },
    #[error("execution {0} is already terminal")]
    ExecutionFinalized(u64),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Pending,
    Executing,
    Executed,
    Failed,
    Cancelled,
}

impl TargetStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TargetStatus::Executed | TargetStatus::Failed | TargetStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Pending => "pending",
            TargetStatus::Executing => "executing",
            TargetStatus::Executed => "executed",
            TargetStatus::Failed => "failed",
            TargetStatus::Cancelled => "cancelled",
        }
    }
}

/// When a pending target is allowed to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCondition {
    /// Fire on the first matching pool event.
    Immediate,
    /// Fire only once probed liquidity reaches `min_liquidity_usd`; driven by
    /// the periodic target sweep rather than the live event path.
    LiquidityAdded,
}

/// A user's standing intent to buy a token as soon as qualifying activity is
/// detected.
#[derive(Debug, Clone)]
pub struct SnipeTarget {
    pub id: u64,
    pub owner_id: i64,
    pub chain: ChainFamily,
    pub token_address: Pubkey,
    pub target_amount_sol: f64,
    pub max_slippage_bps: u16,
    pub priority_fee_lamports: u64,
    pub status: TargetStatus,
    pub trigger: TriggerCondition,
    pub min_liquidity_usd: Option<f64>,
    pub created_at: SystemTime,
}

#[derive(Debug, Clone)]
pub struct NewSnipeTarget {
    pub owner_id: i64,
    pub chain: ChainFamily,
    pub token_address: Pubkey,
    pub target_amount_sol: f64,
    pub max_slippage_bps: u16,
    pub priority_fee_lamports: u64,
    pub trigger: TriggerCondition,
    pub min_liquidity_usd: Option<f64>,
}

/// An intent to replicate swaps observed from another wallet.
#[derive(Debug, Clone)]
pub struct TrackedWallet {
    pub address: Pubkey,
    pub chain: ChainFamily,
    pub label: Option<String>,
    pub is_active: bool,
    pub added_at: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Confirmed | ExecutionStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Submitted => "submitted",
            ExecutionStatus::Confirmed => "confirmed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionKind {
    Snipe,
    CopyTrade,
}

/// Why an execution attempt failed. The first two surface to the intent
/// owner; the rest are operational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    InsufficientBalance,
    ExecutorRejected(String),
    Timeout,
    OnChainFailure(String),
    Internal(String),
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InsufficientBalance => "insufficient_balance",
            FailureReason::ExecutorRejected(_) => "executor_rejected",
            FailureReason::Timeout => "timeout",
            FailureReason::OnChainFailure(_) => "on_chain_failure",
            FailureReason::Internal(_) => "internal",
        }
    }
}

/// Audit record for one execution attempt. `target_id` is `None` for copy
/// trades, which run against a transient pseudo-target. Immutable once
/// `Confirmed` or `Failed`.
#[derive(Debug, Clone)]
pub struct SnipeExecution {
    pub id: u64,
    pub target_id: Option<u64>,
    pub owner_id: i64,
    pub kind: ExecutionKind,
    pub token_address: Pubkey,
    pub status: ExecutionStatus,
    pub amount_in_lamports: u64,
    pub slippage_bps: u16,
    pub detection_time: Instant,
    pub execution_start_time: SystemTime,
    pub completion_time: Option<SystemTime>,
    pub result_tx_hash: Option<String>,
    pub failure_reason: Option<FailureReason>,
}

#[derive(Debug, Clone)]
pub struct NewExecution {
    pub target_id: Option<u64>,
    pub owner_id: i64,
    pub kind: ExecutionKind,
    pub token_address: Pubkey,
    pub amount_in_lamports: u64,
    pub slippage_bps: u16,
    pub detection_time: Instant,
}

/// Abstract intent store. A network-backed implementation may suspend on
/// every call; the in-memory one never does, but keeps the same contract.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Create a new snipe target. Fails with [`StoreError::DuplicateTarget`]
    /// when the owner already has a non-terminal target for the token.
    async fn create_target(&self, new: NewSnipeTarget) -> Result<SnipeTarget, StoreError>;

    async fn get_target(&self, id: u64) -> Result<Option<SnipeTarget>, StoreError>;

    /// Pending targets matching a token address (snipe match strategy).
    async fn pending_targets_for_token(
        &self,
        token: &Pubkey,
    ) -> Result<Vec<SnipeTarget>, StoreError>;

    /// All pending targets, for the periodic condition sweep.
    async fn pending_targets(&self) -> Result<Vec<SnipeTarget>, StoreError>;

    /// Atomic conditional status update. Returns `true` when the record was
    /// in `expected` and is now `new`; `false` when another caller got there
    /// first. This is the claim primitive and must stay atomic.
    async fn compare_and_set_status(
        &self,
        target_id: u64,
        expected: TargetStatus,
        new: TargetStatus,
    ) -> Result<bool, StoreError>;

    /// User-initiated cancel: honored only while the target is still pending.
    /// Returns `false` once the target has been claimed or finished.
    async fn cancel_target(&self, target_id: u64) -> Result<bool, StoreError>;

    async fn add_tracked_wallet(&self, wallet: TrackedWallet) -> Result<(), StoreError>;

    async fn active_tracked_wallets(&self) -> Result<Vec<TrackedWallet>, StoreError>;

    async fn tracked_wallet(&self, address: &Pubkey) -> Result<Option<TrackedWallet>, StoreError>;

    async fn create_execution(&self, new: NewExecution) -> Result<SnipeExecution, StoreError>;

    async fn get_execution(&self, id: u64) -> Result<Option<SnipeExecution>, StoreError>;

    /// Advance an execution record. Rejected once the record is terminal.
    async fn update_execution(
        &self,
        id: u64,
        status: ExecutionStatus,
        tx_hash: Option<String>,
        failure: Option<FailureReason>,
    ) -> Result<(), StoreError>;

    /// Executions awaiting on-chain resolution, for the reconciliation sweep.
    async fn submitted_executions(&self) -> Result<Vec<SnipeExecution>, StoreError>;
}

/// In-memory store. The persistence technology is out of scope for the
/// pipeline; this implementation exists so the binary runs self-contained and
/// so the concurrency contract is testable.
pub struct MemoryIntentStore {
    next_id: AtomicU64,
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    targets: HashMap<u64, SnipeTarget>,
    wallets: HashMap<Pubkey, TrackedWallet>,
    executions: HashMap<u64, SnipeExecution>,
}

impl MemoryIntentStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            inner: Mutex::new(Tables::default()),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MemoryIntentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntentStore for MemoryIntentStore {
    async fn create_target(&self, new: NewSnipeTarget) -> Result<SnipeTarget, StoreError> {
        let id = self.allocate_id();
        let mut tables = self.inner.lock().unwrap();
        let duplicate = tables.targets.values().any(|t| {
            t.owner_id == new.owner_id
                && t.token_address == new.token_address
                && !t.status.is_terminal()
        });
        if duplicate {
            return Err(StoreError::DuplicateTarget {
                owner_id: new.owner_id,
                token: new.token_address,
            });
        }
        let target = SnipeTarget {
            id,
            owner_id: new.owner_id,
            chain: new.chain,
            token_address: new.token_address,
            target_amount_sol: new.target_amount_sol,
            max_slippage_bps: new.max_slippage_bps,
            priority_fee_lamports: new.priority_fee_lamports,
            status: TargetStatus::Pending,
            trigger: new.trigger,
            min_liquidity_usd: new.min_liquidity_usd,
            created_at: SystemTime::now(),
        };
        tables.targets.insert(id, target.clone());
        Ok(target)
    }

    async fn get_target(&self, id: u64) -> Result<Option<SnipeTarget>, StoreError> {
        Ok(self.inner.lock().unwrap().targets.get(&id).cloned())
    }

    async fn pending_targets_for_token(
        &self,
        token: &Pubkey,
    ) -> Result<Vec<SnipeTarget>, StoreError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .targets
            .values()
            .filter(|t| t.status == TargetStatus::Pending && t.token_address == *token)
            .cloned()
            .collect())
    }

    async fn pending_targets(&self) -> Result<Vec<SnipeTarget>, StoreError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .targets
            .values()
            .filter(|t| t.status == TargetStatus::Pending)
            .cloned()
            .collect())
    }

    async fn compare_and_set_status(
        &self,
        target_id: u64,
        expected: TargetStatus,
        new: TargetStatus,
    ) -> Result<bool, StoreError> {
        let mut tables = self.inner.lock().unwrap();
        let target = tables
            .targets
            .get_mut(&target_id)
            .ok_or(StoreError::TargetNotFound(target_id))?;
        if target.status != expected {
            return Ok(false);
        }
        target.status = new;
        Ok(true)
    }

    async fn cancel_target(&self, target_id: u64) -> Result<bool, StoreError> {
        self.compare_and_set_status(target_id, TargetStatus::Pending, TargetStatus::Cancelled)
            .await
    }

    async fn add_tracked_wallet(&self, wallet: TrackedWallet) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .wallets
            .insert(wallet.address, wallet);
        Ok(())
    }

    async fn active_tracked_wallets(&self) -> Result<Vec<TrackedWallet>, StoreError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .wallets
            .values()
            .filter(|w| w.is_active)
            .cloned()
            .collect())
    }

    async fn tracked_wallet(&self, address: &Pubkey) -> Result<Option<TrackedWallet>, StoreError> {
        Ok(self.inner.lock().unwrap().wallets.get(address).cloned())
    }

    async fn create_execution(&self, new: NewExecution) -> Result<SnipeExecution, StoreError> {
        let id = self.allocate_id();
        let execution = SnipeExecution {
            id,
            target_id: new.target_id,
            owner_id: new.owner_id,
            kind: new.kind,
            token_address: new.token_address,
            status: ExecutionStatus::Pending,
            amount_in_lamports: new.amount_in_lamports,
            slippage_bps: new.slippage_bps,
            detection_time: new.detection_time,
            execution_start_time: SystemTime::now(),
            completion_time: None,
            result_tx_hash: None,
            failure_reason: None,
        };
        self.inner
            .lock()
            .unwrap()
            .executions
            .insert(id, execution.clone());
        Ok(execution)
    }

    async fn get_execution(&self, id: u64) -> Result<Option<SnipeExecution>, StoreError> {
        Ok(self.inner.lock().unwrap().executions.get(&id).cloned())
    }

    async fn update_execution(
        &self,
        id: u64,
        status: ExecutionStatus,
        tx_hash: Option<String>,
        failure: Option<FailureReason>,
    ) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().unwrap();
        let execution = tables
            .executions
            .get_mut(&id)
            .ok_or(StoreError::ExecutionNotFound(id))?;
        if execution.status.is_terminal() {
            return Err(StoreError::ExecutionFinalized(id));
        }
        execution.status = status;
        if tx_hash.is_some() {
            execution.result_tx_hash = tx_hash;
        }
        if failure.is_some() {
            execution.failure_reason = failure;
        }
        if status.is_terminal() {
            execution.completion_time = Some(SystemTime::now());
        }
        Ok(())
    }

    async fn submitted_executions(&self) -> Result<Vec<SnipeExecution>, StoreError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .executions
            .values()
            .filter(|e| e.status == ExecutionStatus::Submitted && e.result_tx_hash.is_some())
            .cloned()
            .collect())
    }
}
