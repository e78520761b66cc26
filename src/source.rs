//! Event ingestion: a capability trait over push/pull chain log delivery and
//! the monitor task that keeps one ingestion loop alive per watched program.
//!
//! Push subscriptions reconnect with jittered exponential backoff; pull mode
//! polls on a fixed cadence with a signature cursor. Transient failures are
//! logged and retried, never fatal to the loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use rand::Rng;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::ChainEvent;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("subscription failed: {0}")]
    Subscribe(String),
    #[error("poll failed: {0}")]
    Poll(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// One chain's raw event feed. Implementations are connection-oriented for
/// push and cursor-oriented for pull; the monitor picks between the two.
#[async_trait]
pub trait ChainEventSource: Send + Sync {
    /// Whether a push subscription is available for this source.
    fn supports_push(&self) -> bool;

    /// Run one push subscription for `program_id`, forwarding every observed
    /// event into `sink`. Returns when the upstream stream ends or errors;
    /// the caller owns reconnection.
    async fn subscribe(
        &self,
        program_id: &Pubkey,
        sink: mpsc::Sender<ChainEvent>,
    ) -> SourceResult<()>;

    /// Fetch events for `program_id` newer than `cursor` (a transaction
    /// signature), oldest first, along with the cursor for the next call.
    async fn poll(
        &self,
        program_id: &Pubkey,
        cursor: Option<&str>,
    ) -> SourceResult<(Vec<ChainEvent>, Option<String>)>;
}

/// Supervises ingestion for a set of watched programs. Each program gets one
/// long-lived task; the task survives every transient upstream failure.
pub struct EventMonitor {
    source: Arc<dyn ChainEventSource>,
    sink: mpsc::Sender<ChainEvent>,
    poll_interval: Duration,
}

impl EventMonitor {
    pub fn new(
        source: Arc<dyn ChainEventSource>,
        sink: mpsc::Sender<ChainEvent>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            poll_interval,
        }
    }

    /// Spawn the ingestion loop for one program. Push when the source offers
    /// it, otherwise polling.
    pub fn spawn(&self, program_id: Pubkey) -> JoinHandle<()> {
        let source = Arc::clone(&self.source);
        let sink = self.sink.clone();
        let poll_interval = self.poll_interval;
        if source.supports_push() {
            info!("Watching program {program_id} via push subscription");
            tokio::spawn(run_push(source, program_id, sink))
        } else {
            info!(
                "Watching program {program_id} via polling every {:?}",
                poll_interval
            );
            tokio::spawn(run_pull(source, program_id, sink, poll_interval))
        }
    }
}

async fn run_push(
    source: Arc<dyn ChainEventSource>,
    program_id: Pubkey,
    sink: mpsc::Sender<ChainEvent>,
) {
    let mut attempt: u32 = 0;
    loop {
        match source.subscribe(&program_id, sink.clone()).await {
            Ok(()) => {
                // Clean stream end still means the connection is gone, but a
                // subscription that was established resets the backoff.
                warn!("Subscription for {program_id} ended, reconnecting");
                attempt = 0;
            }
            Err(err) => {
                warn!("Subscription for {program_id} failed: {err}");
            }
        }
        if sink.is_closed() {
            debug!("Event sink closed, stopping watch on {program_id}");
            return;
        }
        let delay = backoff_delay(attempt);
        attempt = attempt.saturating_add(1);
        debug!("Reconnecting to {program_id} in {delay:?} (attempt {attempt})");
        tokio::time::sleep(delay).await;
    }
}

async fn run_pull(
    source: Arc<dyn ChainEventSource>,
    program_id: Pubkey,
    sink: mpsc::Sender<ChainEvent>,
    interval: Duration,
) {
    let mut cursor: Option<String> = None;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match source.poll(&program_id, cursor.as_deref()).await {
            Ok((events, next_cursor)) => {
                if !events.is_empty() {
                    debug!("Poll of {program_id} yielded {} event(s)", events.len());
                }
                cursor = next_cursor.or(cursor);
                for event in events {
                    if sink.send(event).await.is_err() {
                        debug!("Event sink closed, stopping watch on {program_id}");
                        return;
                    }
                }
            }
            Err(err) => {
                // Cursor is kept so the next round re-covers the gap.
                warn!("Poll of {program_id} failed: {err}");
            }
        }
        if sink.is_closed() {
            return;
        }
    }
}

/// Exponential backoff with full jitter, capped at one minute.
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE
        .saturating_mul(2u32.saturating_pow(attempt.min(6)))
        .min(BACKOFF_CAP);
    let jitter_ms = rand::thread_rng().gen_range(0..=exp.as_millis() as u64 / 4);
    (exp + Duration::from_millis(jitter_ms)).min(BACKOFF_CAP)
}
