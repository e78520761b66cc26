//! Solana RPC adapters: log subscription / signature polling behind
//! [`ChainEventSource`], wallet balances behind [`BalanceSource`], and
//! signature status lookup for reconciliation.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, warn};
use solana_pubsub_client::nonblocking::pubsub_client::PubsubClient;
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_rpc_client_api::config::{
    RpcTransactionConfig, RpcTransactionLogsConfig, RpcTransactionLogsFilter,
};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::{
    EncodedTransaction, TransactionConfirmationStatus, UiMessage, UiTransactionEncoding,
};
use spl_associated_token_account::get_associated_token_address;
use tokio::sync::mpsc;

use crate::balance::{BalanceError, BalanceSource};
use crate::events::ChainEvent;
use crate::program_registry::ProgramRegistry;
use crate::source::{ChainEventSource, SourceError, SourceResult};
use crate::sweep::{SignatureStatus, TxStatusSource};

const POLL_SIGNATURE_LIMIT: usize = 25;

/// Solana event feed. Push when a websocket endpoint is configured,
/// otherwise signature polling over plain RPC.
pub struct RpcChainSource {
    rpc: Arc<RpcClient>,
    ws_url: Option<String>,
    registry: Arc<ProgramRegistry>,
}

impl RpcChainSource {
    pub fn new(rpc: Arc<RpcClient>, ws_url: Option<String>, registry: Arc<ProgramRegistry>) -> Self {
        Self {
            rpc,
            ws_url,
            registry,
        }
    }

    /// Fetch a transaction and lift it into a [`ChainEvent`]. `Ok(None)`
    /// means the transaction failed on chain or carries nothing usable.
    async fn fetch_event(&self, signature: &str) -> SourceResult<Option<ChainEvent>> {
        let sig = Signature::from_str(signature)
            .map_err(|e| SourceError::Poll(format!("bad signature {signature}: {e}")))?;
        let tx = self
            .rpc
            .get_transaction_with_config(
                &sig,
                RpcTransactionConfig {
                    encoding: Some(UiTransactionEncoding::Json),
                    commitment: Some(CommitmentConfig::confirmed()),
                    max_supported_transaction_version: Some(0),
                },
            )
            .await
            .map_err(|e| SourceError::Poll(e.to_string()))?;

        let meta = match tx.transaction.meta {
            Some(meta) => meta,
            None => return Ok(None),
        };
        if meta.err.is_some() {
            return Ok(None);
        }
        let log_lines = Option::<Vec<String>>::from(meta.log_messages).unwrap_or_default();
        let account_keys = decode_account_keys(&tx.transaction.transaction);
        let fee_payer = account_keys.first().copied();

        // An event is tagged with whichever watched program its transaction
        // touches; the registry dispatches on that tag later.
        let program_id = match account_keys
            .iter()
            .find(|key| self.registry.has_parser(key))
        {
            Some(program) => *program,
            None => return Ok(None),
        };

        Ok(Some(ChainEvent::new(
            signature.to_string(),
            program_id,
            log_lines,
            account_keys,
            fee_payer,
        )))
    }
}

#[async_trait]
impl ChainEventSource for RpcChainSource {
    fn supports_push(&self) -> bool {
        self.ws_url.is_some()
    }

    async fn subscribe(
        &self,
        program_id: &Pubkey,
        sink: mpsc::Sender<ChainEvent>,
    ) -> SourceResult<()> {
        let ws_url = self
            .ws_url
            .as_deref()
            .ok_or_else(|| SourceError::Subscribe("no websocket endpoint configured".into()))?;
        let client = PubsubClient::new(ws_url)
            .await
            .map_err(|e| SourceError::Subscribe(e.to_string()))?;
        let (mut stream, _unsubscribe) = client
            .logs_subscribe(
                RpcTransactionLogsFilter::Mentions(vec![program_id.to_string()]),
                RpcTransactionLogsConfig {
                    commitment: Some(CommitmentConfig::confirmed()),
                },
            )
            .await
            .map_err(|e| SourceError::Subscribe(e.to_string()))?;

        while let Some(response) = stream.next().await {
            let logs = response.value;
            if logs.err.is_some() {
                continue;
            }
            // Cheap marker check on the pushed log lines before paying for a
            // full transaction fetch.
            if !self.registry.matches_markers(program_id, &logs.logs) {
                continue;
            }
            match self.fetch_event(&logs.signature).await {
                Ok(Some(event)) => {
                    if sink.send(event).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(err) => warn!("Failed to enrich event {}: {err}", logs.signature),
            }
        }
        Ok(())
    }

    async fn poll(
        &self,
        program_id: &Pubkey,
        cursor: Option<&str>,
    ) -> SourceResult<(Vec<ChainEvent>, Option<String>)> {
        let until = cursor
            .map(Signature::from_str)
            .transpose()
            .map_err(|e| SourceError::Poll(format!("bad cursor: {e}")))?;
        let signatures = self
            .rpc
            .get_signatures_for_address_with_config(
                program_id,
                GetConfirmedSignaturesForAddress2Config {
                    before: None,
                    until,
                    limit: Some(POLL_SIGNATURE_LIMIT),
                    commitment: Some(CommitmentConfig::confirmed()),
                },
            )
            .await
            .map_err(|e| SourceError::Poll(e.to_string()))?;

        // Newest first from the RPC; the cursor is the newest signature seen.
        let next_cursor = signatures.first().map(|s| s.signature.clone());
        let mut events = Vec::new();
        for entry in signatures.into_iter().rev() {
            if entry.err.is_some() {
                continue;
            }
            match self.fetch_event(&entry.signature).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err) => {
                    debug!("Skipping signature {}: {err}", entry.signature);
                }
            }
        }
        Ok((events, next_cursor))
    }
}

fn decode_account_keys(transaction: &EncodedTransaction) -> Vec<Pubkey> {
    let message = match transaction {
        EncodedTransaction::Json(tx) => &tx.message,
        _ => return Vec::new(),
    };
    match message {
        UiMessage::Raw(raw) => raw
            .account_keys
            .iter()
            .filter_map(|key| Pubkey::from_str(key).ok())
            .collect(),
        UiMessage::Parsed(parsed) => parsed
            .account_keys
            .iter()
            .filter_map(|account| Pubkey::from_str(&account.pubkey).ok())
            .collect(),
    }
}

/// Wallet balances over plain RPC.
pub struct RpcBalanceSource {
    rpc: Arc<RpcClient>,
}

impl RpcBalanceSource {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl BalanceSource for RpcBalanceSource {
    async fn native_balance(&self, owner: &Pubkey) -> Result<u64, BalanceError> {
        self.rpc
            .get_balance(owner)
            .await
            .map_err(|e| BalanceError::Query(e.to_string()))
    }

    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, BalanceError> {
        let ata = get_associated_token_address(owner, mint);
        let accounts = self
            .rpc
            .get_multiple_accounts(&[ata])
            .await
            .map_err(|e| BalanceError::Query(e.to_string()))?;
        // A missing token account is a zero balance, not an error.
        let account = match accounts.into_iter().next().flatten() {
            Some(account) => account,
            None => return Ok(0),
        };
        let state = spl_token::state::Account::unpack(&account.data)
            .map_err(|e| BalanceError::Query(e.to_string()))?;
        Ok(state.amount)
    }
}

/// Signature status lookup for the reconciliation sweep.
pub struct RpcTxStatusSource {
    rpc: Arc<RpcClient>,
}

impl RpcTxStatusSource {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl TxStatusSource for RpcTxStatusSource {
    async fn signature_statuses(
        &self,
        signatures: &[String],
    ) -> SourceResult<Vec<Option<SignatureStatus>>> {
        let sigs: Vec<Signature> = signatures
            .iter()
            .map(|s| Signature::from_str(s))
            .collect::<Result<_, _>>()
            .map_err(|e| SourceError::Poll(format!("bad signature: {e}")))?;
        let response = self
            .rpc
            .get_signature_statuses(&sigs)
            .await
            .map_err(|e| SourceError::Poll(e.to_string()))?;
        Ok(response
            .value
            .into_iter()
            .map(|status| {
                status.map(|s| SignatureStatus {
                    err: s.err.map(|e| e.to_string()),
                    finalized: matches!(
                        s.confirmation_status,
                        Some(TransactionConfirmationStatus::Finalized)
                    ),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_transaction_status::{UiRawMessage, UiTransaction};

    #[test]
    fn decodes_raw_account_keys() {
        let keys = vec![Pubkey::new_unique(), Pubkey::new_unique()];
        let tx = EncodedTransaction::Json(UiTransaction {
            signatures: vec!["sig".to_string()],
            message: UiMessage::Raw(UiRawMessage {
                header: Default::default(),
                account_keys: keys.iter().map(|k| k.to_string()).collect(),
                recent_blockhash: String::new(),
                instructions: Vec::new(),
                address_table_lookups: None,
            }),
        });
        assert_eq!(decode_account_keys(&tx), keys);
    }

    #[test]
    fn non_json_encoding_yields_no_keys() {
        let tx = EncodedTransaction::LegacyBinary(String::new());
        assert!(decode_account_keys(&tx).is_empty());
    }
}
