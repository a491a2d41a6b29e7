//! Event instance records.
//!
//! [`EventInstanceValue`] is the immutable snapshot handed to and returned
//! from the store. [`EventInstance`] is the persisted shape: the decoded
//! payload is kept as a JSON object string so the record stays opaque to the
//! store and encodes compactly with bincode.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::core::{Address, ChainId};
use crate::error::{Error, Result};

/// Decoded event payload, carried through untouched
pub type EventData = Map<String, Value>;

// ═══════════════════════════════════════════════════════════════════════════════
// FILTER SLOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Name/value refinement distinguishing slots within one event type,
/// e.g. `tokenId` = `5`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSlot {
    /// Field name
    pub name: String,
    /// Field value
    pub value: String,
}

impl FilterSlot {
    /// Create a filter slot
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Legacy single-string encoding, `"<name>=<value>"`
    pub fn legacy_string(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    /// Decode the legacy encoding. The name ends at the first `=`.
    pub fn from_legacy(encoded: &str) -> Option<Self> {
        let (name, value) = encoded.split_once('=')?;
        Some(Self::new(name, value))
    }
}

impl fmt::Display for FilterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT INSTANCE VALUE
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable snapshot of one observed contract event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInstanceValue {
    contract: Address,
    token_contract: Address,
    chain_id: ChainId,
    event_name: String,
    block_number: u64,
    #[serde(default)]
    log_index: u64,
    #[serde(default)]
    filter: Option<FilterSlot>,
    #[serde(default)]
    data: EventData,
}

impl EventInstanceValue {
    /// Create a value with no filter and an empty payload
    pub fn new(
        contract: Address,
        token_contract: Address,
        chain_id: ChainId,
        event_name: impl Into<String>,
        block_number: u64,
    ) -> Self {
        Self {
            contract,
            token_contract,
            chain_id,
            event_name: event_name.into(),
            block_number,
            log_index: 0,
            filter: None,
            data: EventData::new(),
        }
    }

    /// Set the log index within the block
    pub fn with_log_index(mut self, log_index: u64) -> Self {
        self.log_index = log_index;
        self
    }

    /// Set the filter slot
    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some(FilterSlot::new(name, value));
        self
    }

    /// Set the decoded payload
    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }

    /// Emitting contract
    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Associated token contract
    pub fn token_contract(&self) -> Address {
        self.token_contract
    }

    /// Chain the event was observed on
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Event name
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Block number
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Log index within the block
    pub fn log_index(&self) -> u64 {
        self.log_index
    }

    /// Filter slot, if any
    pub fn filter(&self) -> Option<&FilterSlot> {
        self.filter.as_ref()
    }

    /// Decoded payload
    pub fn data(&self) -> &EventData {
        &self.data
    }

    /// Identity key of the record this value persists as
    pub fn primary_key(&self) -> String {
        primary_key(
            &self.contract,
            &self.token_contract,
            self.chain_id,
            &self.event_name,
            self.block_number,
            self.log_index,
            self.filter.as_ref(),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT INSTANCE (PERSISTED)
// ═══════════════════════════════════════════════════════════════════════════════

/// Persisted event instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInstance {
    /// Identity key; equal keys are the same record
    pub primary_key: String,
    /// Emitting contract
    pub contract: Address,
    /// Associated token contract
    pub token_contract: Address,
    /// Chain identifier
    pub chain_id: ChainId,
    /// Event name
    pub event_name: String,
    /// Block number
    pub block_number: u64,
    /// Log index within the block
    pub log_index: u64,
    /// Explicit filter name
    pub filter_name: Option<String>,
    /// Explicit filter value
    pub filter_value: Option<String>,
    /// Legacy `"<name>=<value>"` filter, empty when unfiltered
    pub filter: String,
    /// Payload as a JSON object string
    pub json: String,
}

impl EventInstance {
    /// Build the persisted form of a value
    pub fn from_value(value: &EventInstanceValue) -> Result<Self> {
        let json = serde_json::to_string(&value.data)
            .map_err(|e| Error::Serialization(format!("Failed to encode event data: {}", e)))?;

        Ok(Self {
            primary_key: value.primary_key(),
            contract: value.contract,
            token_contract: value.token_contract,
            chain_id: value.chain_id,
            event_name: value.event_name.clone(),
            block_number: value.block_number,
            log_index: value.log_index,
            filter_name: value.filter.as_ref().map(|f| f.name.clone()),
            filter_value: value.filter.as_ref().map(|f| f.value.clone()),
            filter: value
                .filter
                .as_ref()
                .map(FilterSlot::legacy_string)
                .unwrap_or_default(),
            json,
        })
    }

    /// Snapshot this record as a detached value
    pub fn to_value(&self) -> Result<EventInstanceValue> {
        let data: EventData = if self.json.is_empty() {
            EventData::new()
        } else {
            serde_json::from_str(&self.json).map_err(|e| {
                Error::Deserialization(format!(
                    "Invalid payload in {}: {}",
                    self.primary_key, e
                ))
            })?
        };

        Ok(EventInstanceValue {
            contract: self.contract,
            token_contract: self.token_contract,
            chain_id: self.chain_id,
            event_name: self.event_name.clone(),
            block_number: self.block_number,
            log_index: self.log_index,
            filter: self.filter_slot(),
            data,
        })
    }

    /// Filter slot from the explicit attributes, falling back to the legacy
    /// string for records written before they existed
    pub fn filter_slot(&self) -> Option<FilterSlot> {
        match (&self.filter_name, &self.filter_value) {
            (Some(name), Some(value)) => Some(FilterSlot::new(name.clone(), value.clone())),
            _ => FilterSlot::from_legacy(&self.filter),
        }
    }

}

impl TryFrom<&EventInstanceValue> for EventInstance {
    type Error = Error;

    fn try_from(value: &EventInstanceValue) -> Result<Self> {
        Self::from_value(value)
    }
}

/// Compose the identity key from the distinguishing attributes.
///
/// Free-text fields are length-prefixed (`<bytes>:<text>`), and the filter
/// name and value are encoded separately, so no two distinct identities
/// share a key whatever characters the text contains.
pub fn primary_key(
    contract: &Address,
    token_contract: &Address,
    chain_id: ChainId,
    event_name: &str,
    block_number: u64,
    log_index: u64,
    filter: Option<&FilterSlot>,
) -> String {
    let filter = match filter {
        Some(slot) => format!("{}{}", length_prefixed(&slot.name), length_prefixed(&slot.value)),
        None => String::new(),
    };

    format!(
        "{}-{}-{}-{}-{}-{}-{}",
        contract.eip55_string(),
        token_contract.eip55_string(),
        chain_id,
        block_number,
        log_index,
        length_prefixed(event_name),
        filter
    )
}

fn length_prefixed(text: &str) -> String {
    format!("{}:{}", text.len(), text)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
