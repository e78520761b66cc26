use solana_sdk::{pubkey, pubkey::Pubkey};

use super::{logs_contain_marker, select_token_mint, ParserError, ParserResult, PoolParser};
use crate::events::{ChainEvent, DexKind, TokenEvent};

/// Orca program ID
pub const ORCA_PROGRAM_ID: Pubkey = pubkey!("9W959DqEETiGZocYWCQPaJ6sBmUzgfxXfqGeTEdp3aQP");

const POOL_CREATION_MARKERS: &[&str] = &["InitializePool", "initialize"];

#[derive(Debug, Default)]
pub struct OrcaParser;

impl OrcaParser {
    pub fn new() -> Self {
        Self
    }
}

impl PoolParser for OrcaParser {
    fn program_id(&self) -> Pubkey {
        ORCA_PROGRAM_ID
    }

    fn matches_logs(&self, log_lines: &[String]) -> bool {
        logs_contain_marker(log_lines, POOL_CREATION_MARKERS)
    }

    fn parse(&self, event: &ChainEvent) -> ParserResult<Option<TokenEvent>> {
        if event.log_lines.is_empty() {
            return Err(ParserError::EmptyLogs);
        }
        if !self.matches_logs(&event.log_lines) {
            return Ok(None);
        }

        let token = match select_token_mint(&event.account_keys, &ORCA_PROGRAM_ID) {
            Some(token) => token,
            None => return Ok(None),
        };

        Ok(Some(TokenEvent {
            token_address: token,
            pool_address: token,
            dex: DexKind::Orca,
            counterpart_wallet: event.fee_payer,
            detected_at: event.observed_at,
            source_event_id: event.id.clone(),
        }))
    }
}
