//! The dispatch loop: drains raw chain events from the ingestion channel,
//! drops repeats, parses pool creations, and fans matched work out to the
//! coordinator. One spawned task per matched target keeps a slow execution
//! from blocking the next event.

use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::mpsc;

use crate::{info_async, warn_async};

use crate::coordinator::ExecutionCoordinator;
use crate::dedup::DedupCache;
use crate::events::ChainEvent;
use crate::matcher::TargetMatcher;
use crate::program_registry::ProgramRegistry;

pub struct Pipeline {
    dedup: Arc<DedupCache>,
    registry: Arc<ProgramRegistry>,
    matcher: TargetMatcher,
    coordinator: Arc<ExecutionCoordinator>,
}

impl Pipeline {
    pub fn new(
        dedup: Arc<DedupCache>,
        registry: Arc<ProgramRegistry>,
        matcher: TargetMatcher,
        coordinator: Arc<ExecutionCoordinator>,
    ) -> Self {
        Self {
            dedup,
            registry,
            matcher,
            coordinator,
        }
    }

    /// Run until the ingestion channel closes.
    pub async fn run(&self, mut events: mpsc::Receiver<ChainEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("Event channel closed, pipeline stopping");
    }

    async fn handle_event(&self, event: ChainEvent) {
        // First sighting wins; redelivered or re-polled events stop here.
        if !self.dedup.insert(&event.id) {
            debug!("Dropping duplicate event {}", event.id);
            return;
        }

        let token_event = match self.registry.parse(&event) {
            Ok(Some(token_event)) => token_event,
            Ok(None) => return,
            Err(err) => {
                warn_async!("Parser declined event {}: {err}", event.id);
                return;
            }
        };
        info_async!(
            "New pool detected on {}: token {} (event {})",
            token_event.dex.as_str(),
            token_event.token_address,
            token_event.source_event_id
        );

        match self.matcher.snipe_candidates(&token_event).await {
            Ok(targets) => {
                for target in targets {
                    let coordinator = Arc::clone(&self.coordinator);
                    let token_event = token_event.clone();
                    tokio::spawn(async move {
                        if let Err(err) = coordinator.process_snipe(&target, &token_event).await {
                            error!("Snipe of target {} failed in store: {err}", target.id);
                        }
                    });
                }
            }
            Err(err) => error!("Target lookup failed for event {}: {err}", event.id),
        }

        match self.matcher.copy_candidates(&token_event).await {
            Ok(orders) => {
                for order in orders {
                    let coordinator = Arc::clone(&self.coordinator);
                    let token_event = token_event.clone();
                    tokio::spawn(async move {
                        if let Err(err) = coordinator.process_copy(&order, &token_event).await {
                            error!(
                                "Copy trade for wallet {} failed in store: {err}",
                                order.tracked_wallet
                            );
                        }
                    });
                }
            }
            Err(err) => error!("Tracked wallet lookup failed for event {}: {err}", event.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::{AffordabilityChecker, BalanceError, BalanceSource};
    use crate::coordinator::DEFAULT_CALL_TIMEOUT;
    use crate::events::ChainFamily;
    use crate::notify::{ChannelNotifier, ExecutionOutcome, PipelineNotification};
    use crate::parsers::raydium::RAYDIUM_AMM_PROGRAM_ID;
    use crate::store::{
        IntentStore, MemoryIntentStore, NewSnipeTarget, TargetStatus, TriggerCondition,
    };
    use crate::swap::{
        ExecutorRegistry, SwapError, SwapExecutor, SwapOrder, SwapReceipt, WalletContext,
    };
    use async_trait::async_trait;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Keypair;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RichWallet;

    #[async_trait]
    impl BalanceSource for RichWallet {
        async fn native_balance(&self, _owner: &Pubkey) -> Result<u64, BalanceError> {
            Ok(1_000_000_000)
        }
        async fn token_balance(&self, _o: &Pubkey, _m: &Pubkey) -> Result<u64, BalanceError> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct CountingExecutor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SwapExecutor for CountingExecutor {
        async fn execute(
            &self,
            _order: &SwapOrder,
            _wallet: &WalletContext,
        ) -> Result<SwapReceipt, SwapError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SwapReceipt {
                tx_hash: "tx".to_string(),
                output_amount: None,
                confirmed: false,
            })
        }
    }

    fn pool_event(id: &str, token: Pubkey) -> ChainEvent {
        ChainEvent::new(
            id.to_string(),
            RAYDIUM_AMM_PROGRAM_ID,
            vec!["Program log: initialize2: InitializeInstruction2".to_string()],
            vec![RAYDIUM_AMM_PROGRAM_ID, token],
            None,
        )
    }

    struct TestPipeline {
        store: Arc<MemoryIntentStore>,
        executor: Arc<CountingExecutor>,
        pipeline: Pipeline,
        notifications: mpsc::UnboundedReceiver<PipelineNotification>,
    }

    fn test_pipeline() -> TestPipeline {
        let store = Arc::new(MemoryIntentStore::new());
        let executor = Arc::new(CountingExecutor::default());
        let mut executors = ExecutorRegistry::new();
        executors.register(
            ChainFamily::Solana,
            executor.clone() as Arc<dyn SwapExecutor>,
        );
        let (notifier, notifications) = ChannelNotifier::new();
        let coordinator = Arc::new(ExecutionCoordinator::new(
            store.clone() as Arc<dyn IntentStore>,
            AffordabilityChecker::new(Arc::new(RichWallet), 10_000_000),
            executors,
            Arc::new(notifier),
            WalletContext::new(Arc::new(Keypair::new())),
            DEFAULT_CALL_TIMEOUT,
        ));
        let pipeline = Pipeline::new(
            Arc::new(DedupCache::with_defaults()),
            Arc::new(ProgramRegistry::with_defaults()),
            TargetMatcher::new(store.clone() as Arc<dyn IntentStore>, 0.05, 100),
            coordinator,
        );
        TestPipeline {
            store,
            executor,
            pipeline,
            notifications,
        }
    }

    #[tokio::test]
    async fn matched_event_drives_target_to_executed() {
        let mut t = test_pipeline();
        let token = Pubkey::new_unique();
        let target = t
            .store
            .create_target(NewSnipeTarget {
                owner_id: 7,
                chain: ChainFamily::Solana,
                token_address: token,
                target_amount_sol: 0.01,
                max_slippage_bps: 100,
                priority_fee_lamports: 0,
                trigger: TriggerCondition::Immediate,
                min_liquidity_usd: None,
            })
            .await
            .unwrap();

        t.pipeline.handle_event(pool_event("sig-1", token)).await;

        let note = t.notifications.recv().await.unwrap();
        assert!(matches!(note.outcome, ExecutionOutcome::Executed { .. }));
        let target = t.store.get_target(target.id).await.unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::Executed);
        assert_eq!(t.executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn redelivered_event_executes_once() {
        let mut t = test_pipeline();
        let token = Pubkey::new_unique();
        t.store
            .create_target(NewSnipeTarget {
                owner_id: 7,
                chain: ChainFamily::Solana,
                token_address: token,
                target_amount_sol: 0.01,
                max_slippage_bps: 100,
                priority_fee_lamports: 0,
                trigger: TriggerCondition::Immediate,
                min_liquidity_usd: None,
            })
            .await
            .unwrap();

        // Same signature delivered twice (push plus polling overlap).
        t.pipeline.handle_event(pool_event("sig-dup", token)).await;
        t.pipeline.handle_event(pool_event("sig-dup", token)).await;

        let _ = t.notifications.recv().await.unwrap();
        assert!(t.notifications.try_recv().is_err());
        assert_eq!(t.executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unmatched_event_is_ignored() {
        let mut t = test_pipeline();
        let token = Pubkey::new_unique();
        t.pipeline.handle_event(pool_event("sig-2", token)).await;
        assert!(t.notifications.try_recv().is_err());
        assert_eq!(t.executor.calls.load(Ordering::SeqCst), 0);
    }
}
