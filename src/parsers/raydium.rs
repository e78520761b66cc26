use solana_sdk::{pubkey, pubkey::Pubkey};

use super::{logs_contain_marker, select_token_mint, ParserError, ParserResult, PoolParser};
use crate::events::{ChainEvent, DexKind, TokenEvent};

/// Raydium AMM v4 program ID
pub const RAYDIUM_AMM_PROGRAM_ID: Pubkey = pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");

/// Log markers emitted when a Raydium AMM pool is initialized.
const POOL_CREATION_MARKERS: &[&str] = &["initialize2", "InitializeInstruction"];

#[derive(Debug, Default)]
pub struct RaydiumParser;

impl RaydiumParser {
    pub fn new() -> Self {
        Self
    }
}

impl PoolParser for RaydiumParser {
    fn program_id(&self) -> Pubkey {
        RAYDIUM_AMM_PROGRAM_ID
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

        let token = match select_token_mint(&event.account_keys, &RAYDIUM_AMM_PROGRAM_ID) {
            Some(token) => token,
            None => return Ok(None),
        };

        // The pool account is not decoded from the instruction layout yet;
        // the token hint doubles as the pool address.
        Ok(Some(TokenEvent {
            token_address: token,
            pool_address: token,
            dex: DexKind::Raydium,
            counterpart_wallet: event.fee_payer,
            detected_at: event.observed_at,
            source_event_id: event.id.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_creation_event() -> ChainEvent {
        let fee_payer = Pubkey::new_unique();
        ChainEvent::new(
            "raydium-sig".to_string(),
            RAYDIUM_AMM_PROGRAM_ID,
            vec![
                format!("Program {RAYDIUM_AMM_PROGRAM_ID} invoke [1]"),
                "Program log: initialize2: InitializeInstruction2".to_string(),
            ],
            vec![
                fee_payer,
                RAYDIUM_AMM_PROGRAM_ID,
                Pubkey::new_unique(),
                Pubkey::new_unique(),
            ],
            Some(fee_payer),
        )
    }

    #[test]
    fn parses_pool_creation() {
        let parser = RaydiumParser::new();
        let event = pool_creation_event();
        let token_event = parser.parse(&event).unwrap().expect("should parse");
        assert_eq!(token_event.token_address, event.account_keys[2]);
        assert_eq!(token_event.dex, DexKind::Raydium);
        assert_eq!(token_event.counterpart_wallet, event.fee_payer);
        assert_eq!(token_event.source_event_id, "raydium-sig");
    }

    #[test]
    fn parse_is_deterministic() {
        let parser = RaydiumParser::new();
        let event = pool_creation_event();
        assert_eq!(parser.parse(&event).unwrap(), parser.parse(&event).unwrap());
    }

    #[test]
    fn ignores_unrelated_logs() {
        let parser = RaydiumParser::new();
        let mut event = pool_creation_event();
        event.log_lines = vec!["Program log: swap".to_string()];
        assert!(parser.parse(&event).unwrap().is_none());
    }

    #[test]
    fn empty_logs_are_an_error() {
        let parser = RaydiumParser::new();
        let mut event = pool_creation_event();
        event.log_lines.clear();
        assert!(matches!(
            parser.parse(&event),
            Err(ParserError::EmptyLogs)
        ));
    }

    #[test]
    fn missing_account_keys_yield_no_event() {
        let parser = RaydiumParser::new();
        let mut event = pool_creation_event();
        event.account_keys.clear();
        assert!(parser.parse(&event).unwrap().is_none());
    }
}
