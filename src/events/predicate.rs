//! Match criteria for event instance queries.
//!
//! Predicates are plain conjunctions of equality clauses. Building one never
//! fails; a clause that cannot be satisfied simply matches nothing.

use crate::core::{Address, ChainId};
use crate::events::instance::{EventInstance, FilterSlot};

// ═══════════════════════════════════════════════════════════════════════════════
// CLAUSE
// ═══════════════════════════════════════════════════════════════════════════════

/// One equality clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Emitting contract equals
    Contract(Address),
    /// Chain equals
    Chain(ChainId),
    /// Token contract equals
    TokenContract(Address),
    /// Event name equals
    EventName(String),
    /// Filter slot equals
    Filter(FilterSlot),
}

impl Clause {
    /// Check a single record against this clause
    pub fn matches(&self, event: &EventInstance) -> bool {
        match self {
            Clause::Contract(contract) => &event.contract == contract,
            Clause::Chain(chain) => &event.chain_id == chain,
            Clause::TokenContract(token) => &event.token_contract == token,
            Clause::EventName(name) => &event.event_name == name,
            Clause::Filter(slot) => filter_matches(event, slot),
        }
    }
}

/// Explicit attributes win; records without them are compared through the
/// legacy string so older data stays reachable.
fn filter_matches(event: &EventInstance, slot: &FilterSlot) -> bool {
    match (&event.filter_name, &event.filter_value) {
        (Some(name), Some(value)) => name == &slot.name && value == &slot.value,
        _ => event.filter == slot.legacy_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT PREDICATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Conjunction of clauses; the empty predicate matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPredicate {
    clauses: Vec<Clause>,
}

impl EventPredicate {
    /// Create an empty predicate
    pub fn new() -> Self {
        Self::default()
    }

    /// Contract, chain, token contract and event name must all match
    pub fn matching_event(
        contract: Address,
        token_contract: Address,
        chain: ChainId,
        event_name: &str,
    ) -> Self {
        Self::new()
            .contract(contract)
            .chain(chain)
            .token_contract(token_contract)
            .event_name(event_name)
    }

    /// [`matching_event`](Self::matching_event) narrowed to one filter slot
    pub fn matching_event_with_filter(
        contract: Address,
        token_contract: Address,
        chain: ChainId,
        event_name: &str,
        filter_name: &str,
        filter_value: &str,
    ) -> Self {
        Self::matching_event(contract, token_contract, chain, event_name)
            .filter(filter_name, filter_value)
    }

    /// Every record of one token contract
    pub fn for_token_contract(token_contract: Address) -> Self {
        Self::new().token_contract(token_contract)
    }

    /// Add an emitting contract clause
    pub fn contract(mut self, contract: Address) -> Self {
        self.clauses.push(Clause::Contract(contract));
        self
    }

    /// Add a chain clause
    pub fn chain(mut self, chain: ChainId) -> Self {
        self.clauses.push(Clause::Chain(chain));
        self
    }

    /// Add a token contract clause
    pub fn token_contract(mut self, token_contract: Address) -> Self {
        self.clauses.push(Clause::TokenContract(token_contract));
        self
    }

    /// Add an event name clause
    pub fn event_name(mut self, event_name: &str) -> Self {
        self.clauses.push(Clause::EventName(event_name.to_string()));
        self
    }

    /// Add a filter clause
    pub fn filter(mut self, filter_name: &str, filter_value: &str) -> Self {
        self.clauses
            .push(Clause::Filter(FilterSlot::new(filter_name, filter_value)));
        self
    }

    /// Check if a record satisfies every clause
    pub fn matches(&self, event: &EventInstance) -> bool {
        self.clauses.iter().all(|clause| clause.matches(event))
    }

    /// The token contract this predicate is pinned to, if exactly one.
    /// Collections use it to scan a single token's records.
    pub fn token_scope(&self) -> Option<Address> {
        let mut tokens = self.clauses.iter().filter_map(|clause| match clause {
            Clause::TokenContract(token) => Some(*token),
            _ => None,
        });
        let first = tokens.next()?;
        tokens.all(|t| t == first).then_some(first)
    }

    /// Clauses in insertion order
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
