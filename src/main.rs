mod async_log;
mod balance;
mod config;
mod coordinator;
mod dedup;
mod events;
mod matcher;
mod notify;
mod parsers;
mod pipeline;
mod program_registry;
mod rpc;
mod source;
mod store;
mod swap;
mod sweep;

use std::{env, sync::Arc, time::Duration, time::SystemTime};

use log::{info, warn};
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::native_token::{lamports_to_sol, sol_to_lamports};
use tokio::sync::mpsc;

use crate::{
    balance::AffordabilityChecker,
    config::Config,
    coordinator::ExecutionCoordinator,
    dedup::DedupCache,
    events::ChainFamily,
    matcher::TargetMatcher,
    notify::{ChannelNotifier, Notifier},
    pipeline::Pipeline,
    program_registry::ProgramRegistry,
    rpc::{RpcBalanceSource, RpcChainSource, RpcTxStatusSource},
    source::EventMonitor,
    store::{IntentStore, MemoryIntentStore, NewSnipeTarget, TrackedWallet},
    swap::{
        jupiter::{self, JupiterExecutor},
        ExecutorRegistry, SwapExecutor, WalletContext,
    },
    sweep::{JupiterPriceProbe, ReconciliationSweeper, TargetSweeper, DEFAULT_PRICE_URL},
};

const EVENT_CHANNEL_CAPACITY: usize = 1000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env::set_var(
        env_logger::DEFAULT_FILTER_ENV,
        env::var_os(env_logger::DEFAULT_FILTER_ENV).unwrap_or_else(|| "info".into()),
    );
    env_logger::init();
    let _async_logger = async_log::init_async_logger();

    let config = match Config::load() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            if let Some(path) = err.missing_env_path() {
                warn!("No .env file found at {}", path.display());
            }
            return Err(err.into());
        }
    };
    let rpc = Arc::new(RpcClient::new_with_timeout(
        config.rpc_url.clone(),
        Duration::from_secs(10),
    ));
    log_startup_summary(&config, &rpc).await;

    let registry = Arc::new(ProgramRegistry::with_defaults());
    info!("Created program registry with {} parsers", registry.len());

    let store: Arc<dyn IntentStore> = Arc::new(MemoryIntentStore::new());
    seed_store(&config, store.as_ref()).await?;

    let balances = Arc::new(RpcBalanceSource::new(Arc::clone(&rpc)));
    let checker = AffordabilityChecker::new(balances, config.fee_buffer_lamports());

    let http = reqwest::Client::new();
    let mut executors = ExecutorRegistry::new();
    executors.register(
        ChainFamily::Solana,
        Arc::new(JupiterExecutor::new(
            http.clone(),
            Arc::clone(&rpc),
            config
                .jupiter_base_url
                .clone()
                .unwrap_or_else(|| jupiter::DEFAULT_BASE_URL.to_string()),
        )) as Arc<dyn SwapExecutor>,
    );

    let (notifier, notifications) = ChannelNotifier::new();
    let notifier: Arc<dyn Notifier> = Arc::new(notifier);
    tokio::spawn(sweep::log_notifications(notifications));

    let coordinator = Arc::new(ExecutionCoordinator::new(
        Arc::clone(&store),
        checker,
        executors,
        Arc::clone(&notifier),
        WalletContext::new(config.operator_keypair()),
        config.call_timeout,
    ));

    let target_sweeper = TargetSweeper::new(
        Arc::clone(&store),
        Arc::new(JupiterPriceProbe::new(
            http.clone(),
            config
                .price_api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_PRICE_URL.to_string()),
        )),
        Arc::clone(&coordinator),
        config.sweep_interval,
    );
    tokio::spawn(async move { target_sweeper.run().await });

    let reconciler = ReconciliationSweeper::new(
        Arc::clone(&store),
        Arc::new(RpcTxStatusSource::new(Arc::clone(&rpc))),
        Arc::clone(&notifier),
        config.reconcile_interval,
    );
    tokio::spawn(async move { reconciler.run().await });

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let chain_source = Arc::new(RpcChainSource::new(
        Arc::clone(&rpc),
        config.ws_url.clone(),
        Arc::clone(&registry),
    ));
    let monitor = EventMonitor::new(chain_source, event_tx, config.poll_interval);
    let watch_set = if config.watch_programs.is_empty() {
        registry.program_ids()
    } else {
        config.watch_programs.clone()
    };
    for program_id in watch_set {
        monitor.spawn(program_id);
    }

    let pipeline = Pipeline::new(
        Arc::new(DedupCache::new(config.dedup_ttl, config.dedup_sweep)),
        registry,
        TargetMatcher::new(
            Arc::clone(&store),
            config.copy_buy_amount_sol,
            config.copy_slippage_bps,
        ),
        coordinator,
    );
    pipeline.run(event_rx).await;

    Ok(())
}

async fn log_startup_summary(config: &Config, rpc: &RpcClient) {
    let operator = config.operator_pubkey();
    let balance_lamports = match rpc.get_balance(&operator).await {
        Ok(value) => value,
        Err(err) => {
            warn!("Failed to fetch operator SOL balance: {err}");
            0
        }
    };

    info!(
        "Startup | operator={} | sol={:.4} | copy_buy_sol={:.4} | fee_buffer_sol={:.4}",
        operator,
        lamports_to_sol(balance_lamports),
        config.copy_buy_amount_sol,
        config.fee_buffer_sol,
    );
    info!(
        "Endpoints | rpc={} | ws={}",
        config.rpc_url,
        config.ws_url.as_deref().unwrap_or("none (polling)")
    );

    if config.tracked_wallets.is_empty() {
        info!("Tracked wallets | none configured");
    } else {
        for (idx, wallet) in config.tracked_wallets.iter().enumerate() {
            info!(
                "Tracked {:02} | wallet={} | label={}",
                idx + 1,
                wallet.wallet,
                wallet.label.as_deref().unwrap_or("-"),
            );
        }
    }
    if config.snipe_targets.is_empty() {
        info!("Snipe targets | none configured");
    } else {
        for (idx, target) in config.snipe_targets.iter().enumerate() {
            info!(
                "Snipe {:02} | token={} | amount_sol={:.4} | slippage_bps={} | trigger={:?}",
                idx + 1,
                target.token,
                target.amount_sol,
                target.slippage_bps,
                target.trigger,
            );
        }
    }
}

/// Seed the in-memory store from the env-declared wallets and targets.
async fn seed_store(config: &Config, store: &dyn IntentStore) -> anyhow::Result<()> {
    for wallet in &config.tracked_wallets {
        store
            .add_tracked_wallet(TrackedWallet {
                address: wallet.wallet,
                chain: ChainFamily::Solana,
                label: wallet.label.clone(),
                is_active: true,
                added_at: SystemTime::now(),
            })
            .await?;
    }
    for target in &config.snipe_targets {
        store
            .create_target(NewSnipeTarget {
                owner_id: 0,
                chain: ChainFamily::Solana,
                token_address: target.token,
                target_amount_sol: target.amount_sol,
                max_slippage_bps: target.slippage_bps,
                priority_fee_lamports: sol_to_lamports(target.priority_fee_sol.max(0.0)),
                trigger: target.trigger,
                min_liquidity_usd: target.min_liquidity_usd,
            })
            .await?;
    }
    Ok(())
}
