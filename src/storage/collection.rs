//! Typed event instance collection over a byte-level backend.
//!
//! Records are bincode-encoded under `evt:<token-contract>/<primary key>`, so
//! a token contract's records form one contiguous key range and a predicate
//! pinned to a token contract only scans that range.

use crate::core::Address;
use crate::error::{Error, Result};
use crate::events::instance::EventInstance;
use crate::events::predicate::EventPredicate;
use crate::storage::backend::{make_key, prefixes, BatchOperation, StorageBackend};

/// Event instance collection
pub struct EventCollection<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> EventCollection<B> {
    /// Wrap a backend
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Storage key of a record
    pub fn storage_key(instance: &EventInstance) -> Vec<u8> {
        let mut key = Self::token_prefix(&instance.token_contract);
        key.extend_from_slice(instance.primary_key.as_bytes());
        key
    }

    fn token_prefix(token_contract: &Address) -> Vec<u8> {
        make_key(
            prefixes::EVENT,
            format!("{}/", token_contract.eip55_string()).as_bytes(),
        )
    }

    /// All records matching `predicate`, in storage order
    pub fn query(&self, predicate: &EventPredicate) -> Result<Vec<EventInstance>> {
        Ok(self
            .scan(predicate)?
            .into_iter()
            .map(|(_, instance)| instance)
            .collect())
    }

    /// Any one record matching `predicate`
    pub fn first(&self, predicate: &EventPredicate) -> Result<Option<EventInstance>> {
        Ok(self.query(predicate)?.into_iter().next())
    }

    /// Matching records ordered by block number, then log index, ascending
    pub fn sorted_by_block_number(&self, predicate: &EventPredicate) -> Result<Vec<EventInstance>> {
        let mut events = self.query(predicate)?;
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    /// The matching record with the highest block number
    pub fn last_by_block_number(&self, predicate: &EventPredicate) -> Result<Option<EventInstance>> {
        Ok(self.sorted_by_block_number(predicate)?.pop())
    }

    /// Insert or replace every record in one atomic batch
    pub fn upsert(&self, instances: &[EventInstance]) -> Result<()> {
        let mut operations = Vec::with_capacity(instances.len());
        for instance in instances {
            let value = bincode::serialize(instance).map_err(|e| {
                Error::Serialization(format!("Failed to encode {}: {}", instance.primary_key, e))
            })?;
            operations.push(BatchOperation::put(Self::storage_key(instance), value));
        }
        self.backend.write_batch(operations)
    }

    /// Delete every matching record in one atomic batch, returning how many
    pub fn delete_matching(&self, predicate: &EventPredicate) -> Result<usize> {
        let keys: Vec<Vec<u8>> = self
            .scan(predicate)?
            .into_iter()
            .map(|(key, _)| key)
            .collect();

        if keys.is_empty() {
            return Ok(0);
        }

        let count = keys.len();
        self.backend
            .write_batch(keys.into_iter().map(BatchOperation::delete).collect())?;
        Ok(count)
    }

    /// Number of stored records
    pub fn count(&self) -> Result<usize> {
        Ok(self.backend.list_prefix(prefixes::EVENT)?.len())
    }

    /// Get the underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn scan(&self, predicate: &EventPredicate) -> Result<Vec<(Vec<u8>, EventInstance)>> {
        let prefix = match predicate.token_scope() {
            Some(token) => Self::token_prefix(&token),
            None => prefixes::EVENT.to_vec(),
        };

        let mut matched = Vec::new();
        for (key, value) in self.backend.scan_prefix(&prefix)? {
            let instance: EventInstance = match bincode::deserialize(&value) {
                Ok(instance) => instance,
                Err(e) => {
                    tracing::warn!(
                        "Skipping undecodable record {}: {}",
                        String::from_utf8_lossy(&key),
                        e
                    );
                    continue;
                }
            };
            if predicate.matches(&instance) {
                matched.push((key, instance));
            }
        }
        Ok(matched)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChainId;
    use crate::events::instance::EventInstanceValue;
    use crate::storage::backend::InMemoryStore;

    fn contract() -> Address {
        Address::from_bytes([0x01; 20])
    }

    fn token_a() -> Address {
        Address::from_bytes([0x0a; 20])
    }

    fn token_b() -> Address {
        Address::from_bytes([0x0b; 20])
    }

    fn record(token: Address, block: u64) -> EventInstance {
        EventInstance::from_value(&EventInstanceValue::new(
            contract(),
            token,
            ChainId::MAINNET,
            "Transfer",
            block,
        ))
        .unwrap()
    }

    #[test]
    fn test_upsert_replaces_same_identity() {
        let collection = EventCollection::new(InMemoryStore::new());
        let mut first = record(token_a(), 10);
        collection.upsert(&[first.clone()]).unwrap();

        first.json = r#"{"value":"2"}"#.into();
        collection.upsert(&[first.clone()]).unwrap();

        assert_eq!(collection.count().unwrap(), 1);
        let stored = collection
            .first(&EventPredicate::for_token_contract(token_a()))
            .unwrap()
            .unwrap();
        assert_eq!(stored.json, r#"{"value":"2"}"#);
    }

    #[test]
    fn test_last_by_block_number() {
        let collection = EventCollection::new(InMemoryStore::new());
        collection
            .upsert(&[record(token_a(), 300), record(token_a(), 20), record(token_a(), 100)])
            .unwrap();

        let predicate =
            EventPredicate::matching_event(contract(), token_a(), ChainId::MAINNET, "Transfer");
        let sorted = collection.sorted_by_block_number(&predicate).unwrap();
        let blocks: Vec<u64> = sorted.iter().map(|e| e.block_number).collect();
        assert_eq!(blocks, vec![20, 100, 300]);

        let last = collection.last_by_block_number(&predicate).unwrap().unwrap();
        assert_eq!(last.block_number, 300);
    }

    #[test]
    fn test_delete_matching_scoped_to_token() {
        let collection = EventCollection::new(InMemoryStore::new());
        collection
            .upsert(&[record(token_a(), 1), record(token_a(), 2), record(token_b(), 3)])
            .unwrap();

        let deleted = collection
            .delete_matching(&EventPredicate::for_token_contract(token_a()))
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(collection.count().unwrap(), 1);

        let deleted = collection
            .delete_matching(&EventPredicate::for_token_contract(token_a()))
            .unwrap();
        assert_eq!(deleted, 0);
    }

    #[test]
    fn test_unscoped_query_scans_everything() {
        let collection = EventCollection::new(InMemoryStore::new());
        collection
            .upsert(&[record(token_a(), 1), record(token_b(), 2)])
            .unwrap();

        let all = collection
            .query(&EventPredicate::new().event_name("Transfer"))
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_undecodable_record_is_skipped() {
        let collection = EventCollection::new(InMemoryStore::new());
        collection.upsert(&[record(token_a(), 1)]).unwrap();
        collection
            .backend()
            .set(b"evt:garbage", b"\xff\xff")
            .unwrap();

        assert_eq!(collection.query(&EventPredicate::new()).unwrap().len(), 1);
    }
}
