//! Read-only matching of a [`TokenEvent`] against persisted intents.
//!
//! Two independent strategies run against the same event: snipe targets keyed
//! by token address, and tracked wallets keyed by the counterpart wallet.
//! Matching performs no mutation; every returned candidate becomes an
//! independent claim attempt in the coordinator.

use std::sync::Arc;

use smallvec::SmallVec;
use solana_sdk::pubkey::Pubkey;

use crate::events::{ChainFamily, TokenEvent};
use crate::store::{IntentStore, SnipeTarget, StoreError, TriggerCondition};

/// A synthesized copy-trade order: the transient pseudo-target for replaying
/// a tracked wallet's swap with configured defaults.
#[derive(Debug, Clone)]
pub struct CopyOrder {
    pub tracked_wallet: Pubkey,
    pub chain: ChainFamily,
    pub token_address: Pubkey,
    pub amount_sol: f64,
    pub slippage_bps: u16,
}

pub struct TargetMatcher {
    store: Arc<dyn IntentStore>,
    copy_amount_sol: f64,
    copy_slippage_bps: u16,
}

impl TargetMatcher {
    pub fn new(store: Arc<dyn IntentStore>, copy_amount_sol: f64, copy_slippage_bps: u16) -> Self {
        Self {
            store,
            copy_amount_sol,
            copy_slippage_bps,
        }
    }

    /// Pending snipe targets for the event's token. Only `Immediate` triggers
    /// fire from the live event path; `LiquidityAdded` targets wait for the
    /// condition sweep.
    pub async fn snipe_candidates(
        &self,
        event: &TokenEvent,
    ) -> Result<SmallVec<[SnipeTarget; 4]>, StoreError> {
        let targets = self
            .store
            .pending_targets_for_token(&event.token_address)
            .await?;
        Ok(targets
            .into_iter()
            .filter(|t| t.trigger == TriggerCondition::Immediate)
            .collect())
    }

    /// Copy-trade orders for the event's counterpart wallet, if it is
    /// actively tracked.
    pub async fn copy_candidates(
        &self,
        event: &TokenEvent,
    ) -> Result<SmallVec<[CopyOrder; 4]>, StoreError> {
        let counterpart = match event.counterpart_wallet {
            Some(wallet) => wallet,
            None => return Ok(SmallVec::new()),
        };

        let mut orders = SmallVec::new();
        if let Some(tracked) = self.store.tracked_wallet(&counterpart).await? {
            if tracked.is_active {
                orders.push(CopyOrder {
                    tracked_wallet: tracked.address,
                    chain: tracked.chain,
                    token_address: event.token_address,
                    amount_sol: self.copy_amount_sol,
                    slippage_bps: self.copy_slippage_bps,
                });
            }
        }
        Ok(orders)
    }
}
