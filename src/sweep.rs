//! Periodic sweeps backing the parts of the pipeline that are not driven by
//! live events: condition-triggered targets waiting for a tradable route, and
//! reconciliation of fire-and-forget submissions against chain state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::mpsc;

use crate::coordinator::ExecutionCoordinator;
use crate::events::{DexKind, TokenEvent};
use crate::notify::{ExecutionOutcome, Notifier, PipelineNotification};
use crate::source::{SourceError, SourceResult};
use crate::store::{ExecutionStatus, FailureReason, IntentStore, TriggerCondition};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Status of a previously submitted transaction, as reported by the chain.
#[derive(Debug, Clone)]
pub struct SignatureStatus {
    pub err: Option<String>,
    pub finalized: bool,
}

/// Signature status lookup, batched.
#[async_trait]
pub trait TxStatusSource: Send + Sync {
    /// One entry per input signature; `None` when the chain has not seen it.
    async fn signature_statuses(
        &self,
        signatures: &[String],
    ) -> SourceResult<Vec<Option<SignatureStatus>>>;
}

/// Tradability signal for a mint. Presence of a price means an aggregator
/// route exists; liquidity is reported when the venue exposes it.
#[derive(Debug, Clone, Copy)]
pub struct LiquiditySignal {
    pub price_usd: f64,
    pub liquidity_usd: Option<f64>,
}

#[async_trait]
pub trait LiquidityProbe: Send + Sync {
    /// `Ok(None)` when no route exists for the mint yet.
    async fn probe(&self, mint: &Pubkey) -> SourceResult<Option<LiquiditySignal>>;
}

pub const DEFAULT_PRICE_URL: &str = "https://price.jup.ag/v6";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Liquidity probe against the Jupiter price API: a quoted price means the
/// aggregator can route the mint.
pub struct JupiterPriceProbe {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PriceResponse {
    data: std::collections::HashMap<String, PriceEntry>,
}

#[derive(Deserialize)]
struct PriceEntry {
    price: f64,
    #[serde(default)]
    liquidity: Option<f64>,
}

impl JupiterPriceProbe {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LiquidityProbe for JupiterPriceProbe {
    async fn probe(&self, mint: &Pubkey) -> SourceResult<Option<LiquiditySignal>> {
        let url = format!("{}/price?ids={mint}", self.base_url);
        let response = self
            .http
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| SourceError::Poll(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SourceError::Poll(format!(
                "price api returned {}",
                response.status()
            )));
        }
        let body: PriceResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Poll(e.to_string()))?;
        Ok(body.data.get(&mint.to_string()).map(|entry| LiquiditySignal {
            price_usd: entry.price,
            liquidity_usd: entry.liquidity,
        }))
    }
}

/// Fires `LiquidityAdded` targets once their token becomes tradable. Runs on
/// a fixed cadence; each firing goes through the coordinator's normal claim,
/// so a concurrent live event cannot double-execute the target.
pub struct TargetSweeper {
    store: Arc<dyn IntentStore>,
    probe: Arc<dyn LiquidityProbe>,
    coordinator: Arc<ExecutionCoordinator>,
    interval: Duration,
}

impl TargetSweeper {
    pub fn new(
        store: Arc<dyn IntentStore>,
        probe: Arc<dyn LiquidityProbe>,
        coordinator: Arc<ExecutionCoordinator>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            probe,
            coordinator,
            interval,
        }
    }

    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    /// One sweep round over all pending condition-triggered targets.
    pub async fn sweep_once(&self) {
        let targets = match self.store.pending_targets().await {
            Ok(targets) => targets,
            Err(err) => {
                warn!("Target sweep skipped, store unavailable: {err}");
                return;
            }
        };
        for target in targets {
            if target.trigger != TriggerCondition::LiquidityAdded {
                continue;
            }
            let signal = match self.probe.probe(&target.token_address).await {
                Ok(Some(signal)) => signal,
                Ok(None) => continue,
                Err(err) => {
                    debug!(
                        "Liquidity probe for {} failed: {err}",
                        target.token_address
                    );
                    continue;
                }
            };
            // Without a threshold any routable price fires. With one, a venue
            // that reports no liquidity figure counts as zero.
            if let Some(min) = target.min_liquidity_usd {
                if signal.liquidity_usd.unwrap_or(0.0) < min {
                    continue;
                }
            }
            info!(
                "Liquidity condition met for target {} (token {}, price ${})",
                target.id, target.token_address, signal.price_usd
            );
            let event = TokenEvent {
                token_address: target.token_address,
                pool_address: target.token_address,
                dex: DexKind::Aggregator,
                counterpart_wallet: None,
                detected_at: Instant::now(),
                source_event_id: format!("sweep-{}", target.id),
            };
            if let Err(err) = self.coordinator.process_snipe(&target, &event).await {
                warn!("Condition-triggered snipe of target {} failed: {err}", target.id);
            }
        }
    }
}

/// Promotes fire-and-forget submissions to `Confirmed` or `Failed` by polling
/// their signature statuses. A signature the chain has not seen yet stays
/// `Submitted` for the next round.
pub struct ReconciliationSweeper {
    store: Arc<dyn IntentStore>,
    statuses: Arc<dyn TxStatusSource>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
}

impl ReconciliationSweeper {
    pub fn new(
        store: Arc<dyn IntentStore>,
        statuses: Arc<dyn TxStatusSource>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            statuses,
            notifier,
            interval,
        }
    }

    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.reconcile_once().await;
        }
    }

    pub async fn reconcile_once(&self) {
        let executions = match self.store.submitted_executions().await {
            Ok(executions) => executions,
            Err(err) => {
                warn!("Reconciliation skipped, store unavailable: {err}");
                return;
            }
        };
        if executions.is_empty() {
            return;
        }
        let signatures: Vec<String> = executions
            .iter()
            .filter_map(|e| e.result_tx_hash.clone())
            .collect();
        let statuses = match self.statuses.signature_statuses(&signatures).await {
            Ok(statuses) => statuses,
            Err(err) => {
                warn!("Signature status lookup failed: {err}");
                return;
            }
        };

        for (execution, status) in executions.iter().zip(statuses) {
            let status = match status {
                Some(status) => status,
                None => continue,
            };
            let tx_hash = match &execution.result_tx_hash {
                Some(hash) => hash.clone(),
                None => continue,
            };
            if let Some(err) = status.err {
                info!(
                    "Submission {} for execution {} failed on chain: {err}",
                    tx_hash, execution.id
                );
                let reason = FailureReason::OnChainFailure(err);
                if let Err(store_err) = self
                    .store
                    .update_execution(
                        execution.id,
                        ExecutionStatus::Failed,
                        None,
                        Some(reason.clone()),
                    )
                    .await
                {
                    warn!("Failed to record on-chain failure: {store_err}");
                    continue;
                }
                self.notifier.notify(PipelineNotification {
                    target_id: execution.target_id,
                    execution_id: execution.id,
                    owner_id: execution.owner_id,
                    token_address: execution.token_address,
                    outcome: ExecutionOutcome::Failed { reason },
                });
            } else if status.finalized {
                debug!("Submission {} finalized for execution {}", tx_hash, execution.id);
                if let Err(store_err) = self
                    .store
                    .update_execution(execution.id, ExecutionStatus::Confirmed, None, None)
                    .await
                {
                    warn!("Failed to record confirmation: {store_err}");
                    continue;
                }
                self.notifier.notify(PipelineNotification {
                    target_id: execution.target_id,
                    execution_id: execution.id,
                    owner_id: execution.owner_id,
                    token_address: execution.token_address,
                    outcome: ExecutionOutcome::Confirmed { tx_hash },
                });
            }
        }
    }
}

/// Drain pipeline notifications into the log. Stands in for an outward
/// notification surface when none is wired up.
pub async fn log_notifications(mut receiver: mpsc::UnboundedReceiver<PipelineNotification>) {
    while let Some(note) = receiver.recv().await {
        match &note.outcome {
            ExecutionOutcome::Executed {
                tx_hash,
                output_amount,
                ..
            } => info!(
                "Execution {} submitted for token {}: tx {} (out: {:?})",
                note.execution_id, note.token_address, tx_hash, output_amount
            ),
            ExecutionOutcome::Confirmed { tx_hash } => info!(
                "Execution {} confirmed on chain: tx {}",
                note.execution_id, tx_hash
            ),
            ExecutionOutcome::Failed { reason } => warn!(
                "Execution {} failed for token {}: {}",
                note.execution_id,
                note.token_address,
                reason.as_str()
            ),
        }
    }
}
