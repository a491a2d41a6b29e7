//! Integration tests for the event instance store.
//!
//! These tests drive the public API end to end, including persistence across
//! reopening a file-backed store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use event_instances::prelude::*;
use proptest::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";
const NFT: &str = "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D";

fn dai() -> Address {
    Address::parse(DAI).unwrap()
}

fn nft() -> Address {
    Address::parse(NFT).unwrap()
}

fn transfer(token: Address, block: u64) -> EventInstanceValue {
    EventInstanceValue::new(dai(), token, ChainId::MAINNET, "Transfer", block)
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORE LIFECYCLE TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_add_query_delete_lifecycle() {
    let store = EventStore::in_memory().unwrap();
    let notified = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notified);
    store.subscribe(move |token| sink.lock().unwrap().push(*token));

    // Step 1: Add two transfers
    let written = store
        .add(vec![transfer(dai(), 100), transfer(dai(), 200)], dai())
        .unwrap();
    assert_eq!(written, 2);
    assert_eq!(*notified.lock().unwrap(), vec![dai()]);

    // Step 2: The higher block wins
    let last = store
        .get_last_matching_event(dai(), dai(), ChainId::MAINNET, "Transfer")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last.block_number(), 200);

    // Step 3: A different chain sees nothing
    let other_chain = store
        .get_last_matching_event(dai(), dai(), ChainId::POLYGON, "Transfer")
        .await
        .unwrap();
    assert!(other_chain.is_none());

    // Step 4: Delete clears the token without notifying
    assert_eq!(store.delete_events(dai()).unwrap(), 2);
    assert_eq!(notified.lock().unwrap().len(), 1);

    let last = store
        .get_last_matching_event(dai(), dai(), ChainId::MAINNET, "Transfer")
        .await
        .unwrap();
    assert!(last.is_none());
}

#[test]
fn test_filter_slot_lookup() {
    let store = EventStore::in_memory().unwrap();
    let events = (1..=5)
        .map(|id| transfer(nft(), 1_000 + id).with_filter("tokenId", id.to_string()))
        .collect();
    store.add(events, nft()).unwrap();

    let found = store
        .get_matching_event(dai(), nft(), ChainId::MAINNET, "Transfer", "tokenId", "3")
        .unwrap()
        .unwrap();
    assert_eq!(found.block_number, 1_003);
    assert_eq!(found.filter_name.as_deref(), Some("tokenId"));
    assert_eq!(found.filter_value.as_deref(), Some("3"));
}

#[test]
fn test_ambiguous_text_keeps_records_apart() {
    let store = EventStore::in_memory().unwrap();
    store
        .add(
            vec![
                transfer(nft(), 1).with_filter("a", "b=c"),
                transfer(nft(), 2).with_filter("a=b", "c"),
            ],
            nft(),
        )
        .unwrap();
    assert_eq!(store.count().unwrap(), 2);

    let first = store
        .get_matching_event(dai(), nft(), ChainId::MAINNET, "Transfer", "a", "b=c")
        .unwrap()
        .unwrap();
    assert_eq!(first.block_number, 1);

    let second = store
        .get_matching_event(dai(), nft(), ChainId::MAINNET, "Transfer", "a=b", "c")
        .unwrap()
        .unwrap();
    assert_eq!(second.block_number, 2);

    // Separators inside the event name do not fold two events together
    let dashed = EventInstanceValue::new(dai(), dai(), ChainId::MAINNET, "Transfer-5", 1)
        .with_filter("0-x", "y");
    let plain = EventInstanceValue::new(dai(), dai(), ChainId::MAINNET, "Transfer", 5)
        .with_log_index(1)
        .with_filter("0-x", "y");
    store.add(vec![dashed, plain], dai()).unwrap();
    assert_eq!(store.count().unwrap(), 4);
}

#[test]
fn test_address_case_is_irrelevant() {
    let store = EventStore::in_memory().unwrap();
    let lower = Address::parse(&DAI.to_lowercase()).unwrap();
    store.add(vec![transfer(lower, 7)], lower).unwrap();

    let last = block_on(store.get_last_matching_event(
        dai(),
        Address::parse(&DAI.to_uppercase().replacen("0X", "0x", 1)).unwrap(),
        ChainId::MAINNET,
        "Transfer",
    ))
    .unwrap()
    .unwrap();
    assert_eq!(last.token_contract().to_string(), DAI);
}

#[test]
fn test_payload_survives_storage() {
    let store = EventStore::in_memory().unwrap();
    let mut data = EventData::new();
    data.insert("from".into(), serde_json::json!("0x0000000000000000000000000000000000000001"));
    data.insert("value".into(), serde_json::json!("1000000000000000000"));

    store
        .add(vec![transfer(dai(), 1).with_log_index(4).with_data(data.clone())], dai())
        .unwrap();

    let last = block_on(store.get_last_matching_event(dai(), dai(), ChainId::MAINNET, "Transfer"))
        .unwrap()
        .unwrap();
    assert_eq!(last.data(), &data);
    assert_eq!(last.log_index(), 4);
}

// ═══════════════════════════════════════════════════════════════════════════════
// PERSISTENCE TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_file_store_survives_reopen() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::file(temp_dir.path());

    {
        let store = EventStore::open(&config).unwrap();
        store
            .add(vec![transfer(dai(), 10), transfer(nft(), 11)], dai())
            .unwrap();
        store.delete_events(nft()).unwrap();
    }

    let store = EventStore::open(&config).unwrap();
    assert_eq!(store.count().unwrap(), 1);

    let last = block_on(store.get_last_matching_event(dai(), dai(), ChainId::MAINNET, "Transfer"))
        .unwrap()
        .unwrap();
    assert_eq!(last.block_number(), 10);
}

#[test]
fn test_config_file_round_trip_opens_store() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("config.json");
    StoreConfig::file(temp_dir.path().join("data"))
        .save(&config_path)
        .unwrap();

    let config = StoreConfig::load(&config_path).unwrap();
    let store = EventStore::open(&config).unwrap();
    store.add(vec![transfer(dai(), 1)], dai()).unwrap();
    assert_eq!(store.count().unwrap(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUBSCRIPTION TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_one_notification_per_batch_across_handles() {
    let store = EventStore::in_memory().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    store.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let handles: Vec<_> = (0..4u64)
        .map(|n| {
            let store = store.clone();
            std::thread::spawn(move || {
                store
                    .add(vec![transfer(dai(), n * 10), transfer(dai(), n * 10 + 1)], dai())
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 2);
    }

    assert_eq!(hits.load(Ordering::SeqCst), 4);
    assert_eq!(store.count().unwrap(), 8);
}

#[test]
fn test_panicking_subscriber_does_not_block_others() {
    let store = EventStore::in_memory().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    store.subscribe(|_| panic!("broken subscriber"));
    let counter = Arc::clone(&hits);
    store.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    store.add(vec![transfer(dai(), 1)], dai()).unwrap();
    store.add(vec![transfer(dai(), 2)], dai()).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_updates_receiver_sees_each_batch() {
    let store = EventStore::in_memory().unwrap();
    let mut updates = store.updates();

    store.add(vec![transfer(dai(), 1)], dai()).unwrap();
    store.add(Vec::new(), nft()).unwrap();
    store.add(vec![transfer(nft(), 1)], nft()).unwrap();

    assert_eq!(updates.recv().await.unwrap(), dai());
    assert_eq!(updates.recv().await.unwrap(), nft());
    assert!(updates.try_recv().is_err());
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTY TESTS
// ═══════════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_last_matching_is_max_block(blocks in prop::collection::vec(0u64..1_000_000, 1..20)) {
        let store = EventStore::in_memory().unwrap();
        let events = blocks
            .iter()
            .enumerate()
            .map(|(i, block)| transfer(dai(), *block).with_log_index(i as u64))
            .collect();
        store.add(events, dai()).unwrap();

        let last = block_on(store.get_last_matching_event(dai(), dai(), ChainId::MAINNET, "Transfer"))
            .unwrap()
            .unwrap();
        prop_assert_eq!(last.block_number(), *blocks.iter().max().unwrap());
    }
}
