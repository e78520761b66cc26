//! Execution state machine: claim an intent exactly once, gate on
//! affordability, submit through the swap executor, and reconcile the
//! resulting audit record.
//!
//! The claim (an atomic conditional status update in the store) is the only
//! synchronization point; no lock is held across any network call. Once a
//! target is claimed, every exit path resolves it to a terminal state.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use solana_sdk::native_token::sol_to_lamports;
use thiserror::Error;

use crate::balance::{AffordabilityChecker, NATIVE_DECIMALS};
use crate::events::{ChainFamily, TokenEvent};
use crate::matcher::CopyOrder;
use crate::notify::{ExecutionOutcome, Notifier, PipelineNotification};
use crate::parsers::WSOL_MINT;
use crate::store::{
    ExecutionKind, ExecutionStatus, FailureReason, IntentStore, NewExecution, SnipeTarget,
    StoreError, TargetStatus,
};
use crate::swap::{ExecutorRegistry, SwapError, SwapOrder, SwapReceipt, WalletContext};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Owner id recorded on copy-trade executions (the operator, not a user).
const OPERATOR_OWNER_ID: i64 = 0;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolution of one snipe attempt. `ClaimLost` is a benign concurrency
/// outcome, not an error: another event already claimed the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnipeOutcome {
    ClaimLost,
    Executed { tx_hash: String },
    Failed { reason: FailureReason },
}

pub struct ExecutionCoordinator {
    store: Arc<dyn IntentStore>,
    checker: AffordabilityChecker,
    executors: ExecutorRegistry,
    notifier: Arc<dyn Notifier>,
    wallet: WalletContext,
    call_timeout: Duration,
}

impl ExecutionCoordinator {
    pub fn new(
        store: Arc<dyn IntentStore>,
        checker: AffordabilityChecker,
        executors: ExecutorRegistry,
        notifier: Arc<dyn Notifier>,
        wallet: WalletContext,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            checker,
            executors,
            notifier,
            wallet,
            call_timeout,
        }
    }

    /// Drive one matched snipe target through claim -> gate -> submit.
    pub async fn process_snipe(
        &self,
        target: &SnipeTarget,
        event: &TokenEvent,
    ) -> Result<SnipeOutcome, CoordinatorError> {
        let claimed = self
            .store
            .compare_and_set_status(target.id, TargetStatus::Pending, TargetStatus::Executing)
            .await?;
        if !claimed {
            debug!(
                "Claim lost for target {} (token {}): already taken",
                target.id, target.token_address
            );
            return Ok(SnipeOutcome::ClaimLost);
        }

        // Claimed. From here on the target must end up terminal, whatever
        // fails below.
        let amount_lamports = sol_to_lamports(target.target_amount_sol.max(0.0));
        let execution = match self
            .store
            .create_execution(NewExecution {
                target_id: Some(target.id),
                owner_id: target.owner_id,
                kind: ExecutionKind::Snipe,
                token_address: target.token_address,
                amount_in_lamports: amount_lamports,
                slippage_bps: target.max_slippage_bps,
                detection_time: event.detected_at,
            })
            .await
        {
            Ok(execution) => execution,
            Err(err) => {
                error!(
                    "Failed to create execution record for target {}: {err}",
                    target.id
                );
                self.resolve_target(target.id, TargetStatus::Failed).await;
                return Ok(SnipeOutcome::Failed {
                    reason: FailureReason::Internal(err.to_string()),
                });
            }
        };

        let order = SwapOrder {
            from_asset: WSOL_MINT,
            to_asset: target.token_address,
            amount_raw: amount_lamports,
            max_slippage_bps: target.max_slippage_bps,
            priority_fee_lamports: target.priority_fee_lamports,
        };

        let attempt = self.attempt(execution.id, target.chain, &order).await;
        let outcome = match attempt {
            Ok(receipt) => {
                let status = if receipt.confirmed {
                    ExecutionStatus::Confirmed
                } else {
                    ExecutionStatus::Submitted
                };
                self.record_execution(execution.id, status, Some(receipt.tx_hash.clone()), None)
                    .await;
                self.resolve_target(target.id, TargetStatus::Executed).await;
                self.notifier.notify(PipelineNotification {
                    target_id: Some(target.id),
                    execution_id: execution.id,
                    owner_id: target.owner_id,
                    token_address: target.token_address,
                    outcome: ExecutionOutcome::Executed {
                        tx_hash: receipt.tx_hash.clone(),
                        output_amount: receipt.output_amount,
                        confirmed: receipt.confirmed,
                    },
                });
                SnipeOutcome::Executed {
                    tx_hash: receipt.tx_hash,
                }
            }
            Err(reason) => {
                self.record_execution(
                    execution.id,
                    ExecutionStatus::Failed,
                    None,
                    Some(reason.clone()),
                )
                .await;
                self.resolve_target(target.id, TargetStatus::Failed).await;
                self.notifier.notify(PipelineNotification {
                    target_id: Some(target.id),
                    execution_id: execution.id,
                    owner_id: target.owner_id,
                    token_address: target.token_address,
                    outcome: ExecutionOutcome::Failed {
                        reason: reason.clone(),
                    },
                });
                SnipeOutcome::Failed { reason }
            }
        };
        Ok(outcome)
    }

    /// Replay a tracked wallet's swap. Same flow as a snipe minus the claim:
    /// the pseudo-target is transient, so duplicate suppression rests on the
    /// event dedup cache alone.
    pub async fn process_copy(
        &self,
        order: &CopyOrder,
        event: &TokenEvent,
    ) -> Result<(), CoordinatorError> {
        let amount_lamports = sol_to_lamports(order.amount_sol.max(0.0));
        let execution = self
            .store
            .create_execution(NewExecution {
                target_id: None,
                owner_id: OPERATOR_OWNER_ID,
                kind: ExecutionKind::CopyTrade,
                token_address: order.token_address,
                amount_in_lamports: amount_lamports,
                slippage_bps: order.slippage_bps,
                detection_time: event.detected_at,
            })
            .await?;

        let swap = SwapOrder {
            from_asset: WSOL_MINT,
            to_asset: order.token_address,
            amount_raw: amount_lamports,
            max_slippage_bps: order.slippage_bps,
            priority_fee_lamports: 0,
        };

        match self.attempt(execution.id, order.chain, &swap).await {
            Ok(receipt) => {
                let status = if receipt.confirmed {
                    ExecutionStatus::Confirmed
                } else {
                    ExecutionStatus::Submitted
                };
                self.record_execution(execution.id, status, Some(receipt.tx_hash.clone()), None)
                    .await;
                self.notifier.notify(PipelineNotification {
                    target_id: None,
                    execution_id: execution.id,
                    owner_id: OPERATOR_OWNER_ID,
                    token_address: order.token_address,
                    outcome: ExecutionOutcome::Executed {
                        tx_hash: receipt.tx_hash,
                        output_amount: receipt.output_amount,
                        confirmed: receipt.confirmed,
                    },
                });
            }
            Err(reason) => {
                self.record_execution(
                    execution.id,
                    ExecutionStatus::Failed,
                    None,
                    Some(reason.clone()),
                )
                .await;
                self.notifier.notify(PipelineNotification {
                    target_id: None,
                    execution_id: execution.id,
                    owner_id: OPERATOR_OWNER_ID,
                    token_address: order.token_address,
                    outcome: ExecutionOutcome::Failed { reason },
                });
            }
        }
        Ok(())
    }

    /// The claimed portion of an attempt: affordability gate, record flip to
    /// `Submitted`, executor invocation. Returns the failure category on any
    /// error; the caller finalizes state from it.
    async fn attempt(
        &self,
        execution_id: u64,
        chain: ChainFamily,
        order: &SwapOrder,
    ) -> Result<SwapReceipt, FailureReason> {
        // Affordability gate: runs to completion before the executor is ever
        // involved, so an unfillable order never costs a submission.
        let report = tokio::time::timeout(
            self.call_timeout,
            self.checker
                .check(&self.wallet.pubkey, &order.from_asset, order.amount_raw, NATIVE_DECIMALS),
        )
        .await
        .map_err(|_| FailureReason::Timeout)?
        .map_err(|e| FailureReason::Internal(e.to_string()))?;

        if !report.sufficient {
            debug!(
                "Insufficient balance for execution {execution_id}: have {} need {} ({})",
                report.current_ui, report.required_ui, report.asset
            );
            return Err(FailureReason::InsufficientBalance);
        }

        let executor = self
            .executors
            .get(chain)
            .map_err(|e| FailureReason::ExecutorRejected(e.to_string()))?;

        // Flip to submitted before the call so a crash between submission and
        // confirmation leaves an auditable record instead of a silent loss.
        self.store
            .update_execution(execution_id, ExecutionStatus::Submitted, None, None)
            .await
            .map_err(|e| FailureReason::Internal(e.to_string()))?;

        let receipt = tokio::time::timeout(
            self.call_timeout,
            executor.execute(order, &self.wallet),
        )
        .await
        .map_err(|_| FailureReason::Timeout)?
        .map_err(|e| match e {
            SwapError::Rejected(msg) | SwapError::Quote(msg) => {
                FailureReason::ExecutorRejected(msg)
            }
            other => FailureReason::ExecutorRejected(other.to_string()),
        })?;

        Ok(receipt)
    }

    /// Best-effort execution-record update; a store failure here is logged,
    /// never propagated, so target finalization still runs.
    async fn record_execution(
        &self,
        execution_id: u64,
        status: ExecutionStatus,
        tx_hash: Option<String>,
        failure: Option<FailureReason>,
    ) {
        if let Err(err) = self
            .store
            .update_execution(execution_id, status, tx_hash, failure)
            .await
        {
            warn!("Failed to update execution {execution_id} to {}: {err}", status.as_str());
        }
    }

    /// Finalize a claimed target. The conditional update can only miss if the
    /// record vanished or an operator intervened; either way it is logged.
    async fn resolve_target(&self, target_id: u64, status: TargetStatus) {
        match self
            .store
            .compare_and_set_status(target_id, TargetStatus::Executing, status)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(
                "Target {target_id} was not executing when resolving to {}",
                status.as_str()
            ),
            Err(err) => error!("Failed to resolve target {target_id}: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::{BalanceError, BalanceSource, DEFAULT_FEE_BUFFER_LAMPORTS};
    use crate::events::{ChainFamily, DexKind};
    use crate::notify::ChannelNotifier;
    use crate::store::{
        MemoryIntentStore, NewSnipeTarget, SnipeExecution, TrackedWallet, TriggerCondition,
    };
    use crate::swap::SwapExecutor;
    use async_trait::async_trait;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Keypair;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;
    use tokio::sync::mpsc;

    struct FixedNative(u64);

    #[async_trait]
    impl BalanceSource for FixedNative {
        async fn native_balance(&self, _owner: &Pubkey) -> Result<u64, BalanceError> {
            Ok(self.0)
        }
        async fn token_balance(&self, _o: &Pubkey, _m: &Pubkey) -> Result<u64, BalanceError> {
            Ok(0)
        }
    }

    struct FailingBalances;

    #[async_trait]
    impl BalanceSource for FailingBalances {
        async fn native_balance(&self, _owner: &Pubkey) -> Result<u64, BalanceError> {
            Err(BalanceError::Query("rpc unreachable".into()))
        }
        async fn token_balance(&self, _o: &Pubkey, _m: &Pubkey) -> Result<u64, BalanceError> {
            Err(BalanceError::Query("rpc unreachable".into()))
        }
    }

    #[derive(Default)]
    struct MockExecutor {
        calls: AtomicUsize,
        fail: AtomicBool,
        hang: AtomicBool,
    }

    #[async_trait]
    impl SwapExecutor for MockExecutor {
        async fn execute(
            &self,
            _order: &SwapOrder,
            _wallet: &WalletContext,
        ) -> Result<SwapReceipt, SwapError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(SwapError::Rejected("no route".into()));
            }
            Ok(SwapReceipt {
                tx_hash: "abc".to_string(),
                output_amount: Some(1_000),
                confirmed: false,
            })
        }
    }

    /// Delegates to an in-memory store but fails selected write operations,
    /// for checking that claimed targets still end up terminal.
    struct FaultyStore {
        inner: Arc<MemoryIntentStore>,
        fail_create_execution: AtomicBool,
        fail_update_execution: AtomicBool,
    }

    impl FaultyStore {
        fn new(inner: Arc<MemoryIntentStore>) -> Self {
            Self {
                inner,
                fail_create_execution: AtomicBool::new(false),
                fail_update_execution: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl IntentStore for FaultyStore {
        async fn create_target(&self, new: NewSnipeTarget) -> Result<SnipeTarget, StoreError> {
            self.inner.create_target(new).await
        }

        async fn get_target(&self, id: u64) -> Result<Option<SnipeTarget>, StoreError> {
            self.inner.get_target(id).await
        }

        async fn pending_targets_for_token(
            &self,
            token: &Pubkey,
        ) -> Result<Vec<SnipeTarget>, StoreError> {
            self.inner.pending_targets_for_token(token).await
        }

        async fn pending_targets(&self) -> Result<Vec<SnipeTarget>, StoreError> {
            self.inner.pending_targets().await
        }

        async fn compare_and_set_status(
            &self,
            target_id: u64,
            expected: TargetStatus,
            new: TargetStatus,
        ) -> Result<bool, StoreError> {
            self.inner
                .compare_and_set_status(target_id, expected, new)
                .await
        }

        async fn cancel_target(&self, target_id: u64) -> Result<bool, StoreError> {
            self.inner.cancel_target(target_id).await
        }

        async fn add_tracked_wallet(&self, wallet: TrackedWallet) -> Result<(), StoreError> {
            self.inner.add_tracked_wallet(wallet).await
        }

        async fn active_tracked_wallets(&self) -> Result<Vec<TrackedWallet>, StoreError> {
            self.inner.active_tracked_wallets().await
        }

        async fn tracked_wallet(
            &self,
            address: &Pubkey,
        ) -> Result<Option<TrackedWallet>, StoreError> {
            self.inner.tracked_wallet(address).await
        }

        async fn create_execution(&self, new: NewExecution) -> Result<SnipeExecution, StoreError> {
            if self.fail_create_execution.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("write rejected".into()));
            }
            self.inner.create_execution(new).await
        }

        async fn get_execution(&self, id: u64) -> Result<Option<SnipeExecution>, StoreError> {
            self.inner.get_execution(id).await
        }

        async fn update_execution(
            &self,
            id: u64,
            status: ExecutionStatus,
            tx_hash: Option<String>,
            failure: Option<FailureReason>,
        ) -> Result<(), StoreError> {
            if self.fail_update_execution.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("write rejected".into()));
            }
            self.inner.update_execution(id, status, tx_hash, failure).await
        }

        async fn submitted_executions(&self) -> Result<Vec<SnipeExecution>, StoreError> {
            self.inner.submitted_executions().await
        }
    }

    struct Harness {
        store: Arc<MemoryIntentStore>,
        executor: Arc<MockExecutor>,
        coordinator: Arc<ExecutionCoordinator>,
        notifications: mpsc::UnboundedReceiver<PipelineNotification>,
    }

    fn harness_with(balances: Arc<dyn BalanceSource>, timeout: Duration) -> Harness {
        let store = Arc::new(MemoryIntentStore::new());
        let executor = Arc::new(MockExecutor::default());
        let mut executors = ExecutorRegistry::new();
        executors.register(ChainFamily::Solana, executor.clone() as Arc<dyn SwapExecutor>);
        let (notifier, notifications) = ChannelNotifier::new();
        let coordinator = Arc::new(ExecutionCoordinator::new(
            store.clone() as Arc<dyn IntentStore>,
            AffordabilityChecker::new(balances, DEFAULT_FEE_BUFFER_LAMPORTS),
            executors,
            Arc::new(notifier),
            WalletContext::new(Arc::new(Keypair::new())),
            timeout,
        ));
        Harness {
            store,
            executor,
            coordinator,
            notifications,
        }
    }

    fn harness(native_lamports: u64) -> Harness {
        harness_with(Arc::new(FixedNative(native_lamports)), DEFAULT_CALL_TIMEOUT)
    }

    async fn pending_target(store: &MemoryIntentStore, token: Pubkey) -> SnipeTarget {
        store
            .create_target(NewSnipeTarget {
                owner_id: 42,
                chain: ChainFamily::Solana,
                token_address: token,
                target_amount_sol: 0.01,
                max_slippage_bps: 100,
                priority_fee_lamports: 0,
                trigger: TriggerCondition::Immediate,
                min_liquidity_usd: None,
            })
            .await
            .unwrap()
    }

    fn event_for(token: Pubkey) -> TokenEvent {
        TokenEvent {
            token_address: token,
            pool_address: token,
            dex: DexKind::Raydium,
            counterpart_wallet: None,
            detected_at: Instant::now(),
            source_event_id: "sig".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_snipe_executes_target() {
        // 0.02 SOL covers 0.01 requested + 0.01 fee buffer.
        let mut h = harness(20_000_000);
        let token = Pubkey::new_unique();
        let target = pending_target(&h.store, token).await;

        let outcome = h
            .coordinator
            .process_snipe(&target, &event_for(token))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SnipeOutcome::Executed {
                tx_hash: "abc".to_string()
            }
        );

        let target = h.store.get_target(target.id).await.unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::Executed);

        let executions = h.store.submitted_executions().await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Submitted);
        assert_eq!(executions[0].result_tx_hash.as_deref(), Some("abc"));

        let note = h.notifications.recv().await.unwrap();
        assert!(matches!(
            note.outcome,
            ExecutionOutcome::Executed { ref tx_hash, .. } if tx_hash == "abc"
        ));
    }

    #[tokio::test]
    async fn insufficient_balance_never_reaches_executor() {
        // 0.001 SOL cannot cover 0.01 + fee buffer.
        let mut h = harness(1_000_000);
        let token = Pubkey::new_unique();
        let target = pending_target(&h.store, token).await;

        let outcome = h
            .coordinator
            .process_snipe(&target, &event_for(token))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SnipeOutcome::Failed {
                reason: FailureReason::InsufficientBalance
            }
        );
        assert_eq!(h.executor.calls.load(Ordering::SeqCst), 0);

        let target = h.store.get_target(target.id).await.unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::Failed);

        let note = h.notifications.recv().await.unwrap();
        assert!(matches!(
            note.outcome,
            ExecutionOutcome::Failed {
                reason: FailureReason::InsufficientBalance
            }
        ));
    }

    #[tokio::test]
    async fn lost_claim_is_silent() {
        let mut h = harness(20_000_000);
        let token = Pubkey::new_unique();
        let target = pending_target(&h.store, token).await;
        h.store
            .compare_and_set_status(target.id, TargetStatus::Pending, TargetStatus::Executing)
            .await
            .unwrap();

        let outcome = h
            .coordinator
            .process_snipe(&target, &event_for(token))
            .await
            .unwrap();
        assert_eq!(outcome, SnipeOutcome::ClaimLost);
        assert_eq!(h.executor.calls.load(Ordering::SeqCst), 0);
        assert!(h.notifications.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_events_execute_once() {
        let h = harness(20_000_000);
        let token = Pubkey::new_unique();
        let target = pending_target(&h.store, token).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = Arc::clone(&h.coordinator);
            let target = target.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .process_snipe(&target, &event_for(target.token_address))
                    .await
                    .unwrap()
            }));
        }

        let mut executed = 0;
        let mut lost = 0;
        for handle in handles {
            match handle.await.unwrap() {
                SnipeOutcome::Executed { .. } => executed += 1,
                SnipeOutcome::ClaimLost => lost += 1,
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(executed, 1);
        assert_eq!(lost, 7);
        assert_eq!(h.executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn executor_rejection_fails_target_terminally() {
        let mut h = harness(20_000_000);
        h.executor.fail.store(true, Ordering::SeqCst);
        let token = Pubkey::new_unique();
        let target = pending_target(&h.store, token).await;

        let outcome = h
            .coordinator
            .process_snipe(&target, &event_for(token))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SnipeOutcome::Failed {
                reason: FailureReason::ExecutorRejected(_)
            }
        ));

        let target = h.store.get_target(target.id).await.unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::Failed);
        let note = h.notifications.recv().await.unwrap();
        let execution = h
            .store
            .get_execution(note.execution_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn balance_failure_still_finalizes_target() {
        let h = harness_with(Arc::new(FailingBalances), DEFAULT_CALL_TIMEOUT);
        let token = Pubkey::new_unique();
        let target = pending_target(&h.store, token).await;

        let outcome = h
            .coordinator
            .process_snipe(&target, &event_for(token))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SnipeOutcome::Failed {
                reason: FailureReason::Internal(_)
            }
        ));
        let target = h.store.get_target(target.id).await.unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::Failed);
        assert_eq!(h.executor.calls.load(Ordering::SeqCst), 0);
    }

    struct FaultyHarness {
        store: Arc<FaultyStore>,
        executor: Arc<MockExecutor>,
        coordinator: Arc<ExecutionCoordinator>,
    }

    fn faulty_harness() -> FaultyHarness {
        let store = Arc::new(FaultyStore::new(Arc::new(MemoryIntentStore::new())));
        let executor = Arc::new(MockExecutor::default());
        let mut executors = ExecutorRegistry::new();
        executors.register(ChainFamily::Solana, executor.clone() as Arc<dyn SwapExecutor>);
        let (notifier, _notifications) = ChannelNotifier::new();
        let coordinator = Arc::new(ExecutionCoordinator::new(
            store.clone() as Arc<dyn IntentStore>,
            AffordabilityChecker::new(
                Arc::new(FixedNative(20_000_000)),
                DEFAULT_FEE_BUFFER_LAMPORTS,
            ),
            executors,
            Arc::new(notifier),
            WalletContext::new(Arc::new(Keypair::new())),
            DEFAULT_CALL_TIMEOUT,
        ));
        FaultyHarness {
            store,
            executor,
            coordinator,
        }
    }

    #[tokio::test]
    async fn execution_record_failure_still_finalizes_target() {
        let h = faulty_harness();
        let token = Pubkey::new_unique();
        let target = pending_target(&h.store.inner, token).await;
        h.store.fail_create_execution.store(true, Ordering::SeqCst);

        let outcome = h
            .coordinator
            .process_snipe(&target, &event_for(token))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SnipeOutcome::Failed {
                reason: FailureReason::Internal(_)
            }
        ));
        assert_eq!(h.executor.calls.load(Ordering::SeqCst), 0);
        let target = h.store.inner.get_target(target.id).await.unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::Failed);
    }

    #[tokio::test]
    async fn submission_flip_failure_still_finalizes_target() {
        let h = faulty_harness();
        let token = Pubkey::new_unique();
        let target = pending_target(&h.store.inner, token).await;
        h.store.fail_update_execution.store(true, Ordering::SeqCst);

        let outcome = h
            .coordinator
            .process_snipe(&target, &event_for(token))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SnipeOutcome::Failed {
                reason: FailureReason::Internal(_)
            }
        ));
        // The flip to submitted happens before the executor is called.
        assert_eq!(h.executor.calls.load(Ordering::SeqCst), 0);
        let target = h.store.inner.get_target(target.id).await.unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::Failed);
    }

    #[tokio::test]
    async fn executor_timeout_fails_target_terminally() {
        let h = harness_with(
            Arc::new(FixedNative(20_000_000)),
            Duration::from_millis(50),
        );
        h.executor.hang.store(true, Ordering::SeqCst);
        let token = Pubkey::new_unique();
        let target = pending_target(&h.store, token).await;

        let outcome = h
            .coordinator
            .process_snipe(&target, &event_for(token))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SnipeOutcome::Failed {
                reason: FailureReason::Timeout
            }
        );
        let target = h.store.get_target(target.id).await.unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::Failed);
    }

    #[tokio::test]
    async fn copy_trade_records_pseudo_target_execution() {
        let mut h = harness(200_000_000);
        let token = Pubkey::new_unique();
        let order = CopyOrder {
            tracked_wallet: Pubkey::new_unique(),
            chain: ChainFamily::Solana,
            token_address: token,
            amount_sol: 0.05,
            slippage_bps: 250,
        };

        h.coordinator
            .process_copy(&order, &event_for(token))
            .await
            .unwrap();

        let note = h.notifications.recv().await.unwrap();
        assert_eq!(note.target_id, None);
        let execution = h
            .store
            .get_execution(note.execution_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.kind, ExecutionKind::CopyTrade);
        assert_eq!(execution.target_id, None);
        assert_eq!(execution.status, ExecutionStatus::Submitted);
    }
}
