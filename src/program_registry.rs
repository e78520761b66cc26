use crate::events::{ChainEvent, TokenEvent};
use crate::parsers::{orca::OrcaParser, raydium::RaydiumParser, ParserResult, PoolParser};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry that holds all pool parsers, keyed by watched program id.
#[derive(Debug)]
pub struct ProgramRegistry {
    parsers: HashMap<Pubkey, Arc<dyn PoolParser>>,
}

impl ProgramRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Create a registry with default parsers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register_parser(Arc::new(RaydiumParser::new()));
        registry.register_parser(Arc::new(OrcaParser::new()));

        registry
    }

    /// Register a parser for a program
    pub fn register_parser(&mut self, parser: Arc<dyn PoolParser>) {
        let program_id = parser.program_id();
        self.parsers.insert(program_id, parser);
    }

    /// Get a parser for a specific program
    pub fn get_parser(&self, program_id: &Pubkey) -> Option<&Arc<dyn PoolParser>> {
        self.parsers.get(program_id)
    }

    /// Check if a parser exists for a program
    pub fn has_parser(&self, program_id: &Pubkey) -> bool {
        self.parsers.contains_key(program_id)
    }

    /// Get the number of registered parsers
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Get all registered program IDs
    pub fn program_ids(&self) -> Vec<Pubkey> {
        self.parsers.keys().copied().collect()
    }

    /// Cheap log-marker prefilter for the event source: true when the parser
    /// registered for `program_id` considers these logs interesting enough to
    /// pay for transaction enrichment.
    pub fn matches_markers(&self, program_id: &Pubkey, log_lines: &[String]) -> bool {
        self.parsers
            .get(program_id)
            .is_some_and(|parser| parser.matches_logs(log_lines))
    }

    /// Run the full parse for the event's program.
    ///
    /// Returns `Ok(None)` both when no parser is registered and when the
    /// registered parser finds no recognizable pool pattern.
    pub fn parse(&self, event: &ChainEvent) -> ParserResult<Option<TokenEvent>> {
        match self.parsers.get(&event.program_id) {
            Some(parser) => parser.parse(event),
            None => Ok(None),
        }
    }
}

impl Default for ProgramRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::orca::ORCA_PROGRAM_ID;
    use crate::parsers::raydium::RAYDIUM_AMM_PROGRAM_ID;

    #[test]
    fn registry_creation() {
        let registry = ProgramRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn registry_with_defaults() {
        let registry = ProgramRegistry::with_defaults();
        assert_eq!(registry.len(), 2);
        assert!(registry.has_parser(&RAYDIUM_AMM_PROGRAM_ID));
        assert!(registry.has_parser(&ORCA_PROGRAM_ID));
    }

    #[test]
    fn register_parser() {
        let mut registry = ProgramRegistry::new();
        registry.register_parser(Arc::new(RaydiumParser::new()));

        assert_eq!(registry.len(), 1);
        assert!(registry.get_parser(&RAYDIUM_AMM_PROGRAM_ID).is_some());
    }

    #[test]
    fn unknown_program_parses_to_none() {
        let registry = ProgramRegistry::with_defaults();
        let event = ChainEvent::new(
            "sig".to_string(),
            Pubkey::new_unique(),
            Vec::new(),
            Vec::new(),
            None,
        );
        assert!(registry.parse(&event).unwrap().is_none());
    }

    #[test]
    fn marker_prefilter_routes_by_program() {
        let registry = ProgramRegistry::with_defaults();
        let logs = vec!["Program log: initialize2: InitializeInstruction2".to_string()];
        assert!(registry.matches_markers(&RAYDIUM_AMM_PROGRAM_ID, &logs));
        assert!(!registry.matches_markers(&Pubkey::new_unique(), &logs));
    }
}
