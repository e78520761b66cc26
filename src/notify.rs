//! Outcome notifications for the surrounding application (the chat layer
//! lives outside this pipeline). Only owner-relevant outcomes are emitted:
//! submitted/confirmed executions, executor rejections, and balance
//! shortfalls. Claim losses and parse misses stay at log level.

use solana_sdk::pubkey::Pubkey;
use tokio::sync::mpsc;

use crate::store::FailureReason;

#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// Swap submitted (and possibly confirmed by the executor itself).
    Executed {
        tx_hash: String,
        output_amount: Option<u64>,
        confirmed: bool,
    },
    /// Later promoted by the reconciliation sweep.
    Confirmed { tx_hash: String },
    Failed { reason: FailureReason },
}

/// One notification per resolved execution attempt. The pipeline never
/// formats human-readable text; consumers do.
#[derive(Debug, Clone)]
pub struct PipelineNotification {
    pub target_id: Option<u64>,
    pub execution_id: u64,
    pub owner_id: i64,
    pub token_address: Pubkey,
    pub outcome: ExecutionOutcome,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: PipelineNotification);
}

/// Channel-backed notifier; the application drains the receiver.
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<PipelineNotification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineNotification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: PipelineNotification) {
        // Receiver dropped means the app is shutting down; nothing to do.
        let _ = self.sender.send(notification);
    }
}
