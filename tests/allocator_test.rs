//! Integration tests for the transactional code allocator.

use std::sync::Arc;

use vendd::allocator::{Allocation, CodeAllocator};
use vendd::retry::RetryPolicy;
use vendd::storage::Storage;

async fn test_storage() -> (tempfile::TempDir, Storage) {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new(dir.path()).await.expect("storage");
    (dir, storage)
}

#[tokio::test]
async fn allocates_the_single_code_exactly_once_under_concurrency() {
    let (_dir, storage) = test_storage().await;
    let offer_id = storage
        .insert_offer("Steam Key 10", "Enjoy!", "Wait a bit.")
        .await
        .unwrap();
    storage.insert_code(offer_id, "ABC-123").await.unwrap();

    let allocator = CodeAllocator::new(storage.pool()).with_retry(RetryPolicy::instant());
    let offer = allocator
        .find_offer_by_title("steam key 10 pcs")
        .await
        .unwrap()
        .expect("offer should match");
    let offer = Arc::new(offer);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let allocator = allocator.clone();
        let offer = Arc::clone(&offer);
        tasks.push(tokio::spawn(async move {
            allocator.allocate(&format!("conv-{i}"), &offer).await
        }));
    }

    let mut fulfilled = 0;
    let mut exhausted = 0;
    for task in tasks {
        match task.await.unwrap().expect("allocation must not error") {
            Allocation::Fulfilled { code, .. } => {
                assert_eq!(code, "ABC-123");
                fulfilled += 1;
            }
            Allocation::Exhausted { .. } => exhausted += 1,
        }
    }
    assert_eq!(fulfilled, 1, "exactly one allocation must win");
    assert_eq!(exhausted, 7, "every other caller gets the fallback");
}

#[tokio::test]
async fn concurrent_allocations_yield_pairwise_disjoint_codes() {
    let (_dir, storage) = test_storage().await;
    let offer_id = storage.insert_offer("Game Pass", "GL HF", "Sorry.").await.unwrap();
    for i in 0..5 {
        storage
            .insert_code(offer_id, &format!("KEY-{i}"))
            .await
            .unwrap();
    }

    let allocator = CodeAllocator::new(storage.pool()).with_retry(RetryPolicy::instant());
    let offer = allocator
        .find_offer_by_title("Game Pass Ultimate")
        .await
        .unwrap()
        .unwrap();
    let offer = Arc::new(offer);

    let mut tasks = Vec::new();
    for i in 0..5 {
        let allocator = allocator.clone();
        let offer = Arc::clone(&offer);
        tasks.push(tokio::spawn(async move {
            allocator.allocate(&format!("conv-{i}"), &offer).await
        }));
    }

    let mut codes = Vec::new();
    for task in tasks {
        match task.await.unwrap().unwrap() {
            Allocation::Fulfilled { code, .. } => codes.push(code),
            Allocation::Exhausted { .. } => panic!("inventory should cover all callers"),
        }
    }
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), 5, "no code may be returned twice");
}

#[tokio::test]
async fn fulfillment_scenario_then_exhaustion() {
    let (_dir, storage) = test_storage().await;
    let offer_id = storage
        .insert_offer("Steam Key 10", "Enjoy!", "Wait a bit.")
        .await
        .unwrap();
    storage.insert_code(offer_id, "ABC-123").await.unwrap();

    let allocator = CodeAllocator::new(storage.pool()).with_retry(RetryPolicy::instant());
    let offer = allocator
        .find_offer_by_title("steam key 10 pcs")
        .await
        .unwrap()
        .unwrap();

    // First conversation gets the code and the offer's correct-message.
    match allocator.allocate("conv-1", &offer).await.unwrap() {
        Allocation::Fulfilled { message, code } => {
            assert_eq!(code, "ABC-123");
            assert!(message.contains("ABC-123"));
            assert!(message.contains("Enjoy!"));
        }
        other => panic!("expected fulfillment, got {other:?}"),
    }

    // The row is now reserved for conv-1, visible via the idempotency query.
    let reserved = allocator.allocations_for_conversation("conv-1").await.unwrap();
    assert_eq!(reserved.len(), 1);
    assert!(reserved[0].used);
    assert_eq!(reserved[0].conversation_id.as_deref(), Some("conv-1"));

    // Second conversation for the same offer: inventory exhausted.
    match allocator.allocate("conv-2", &offer).await.unwrap() {
        Allocation::Exhausted { message } => assert!(message.contains("Wait a bit.")),
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert!(allocator
        .allocations_for_conversation("conv-2")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn title_matching_is_case_and_whitespace_insensitive() {
    let (_dir, storage) = test_storage().await;
    storage
        .insert_offer("Premium Voucher", "Enjoy!", "Sorry.")
        .await
        .unwrap();

    let allocator = CodeAllocator::new(storage.pool());

    let hit = allocator
        .find_offer_by_title("  PREMIUM voucher XL  ")
        .await
        .unwrap();
    assert_eq!(hit.unwrap().title, "Premium Voucher");

    let miss = allocator
        .find_offer_by_title("Standard Voucher")
        .await
        .unwrap();
    assert!(miss.is_none());
}

#[tokio::test]
async fn inactive_offers_never_match() {
    let (_dir, storage) = test_storage().await;
    let offer_id = storage
        .insert_offer("Premium Voucher", "Enjoy!", "Sorry.")
        .await
        .unwrap();
    storage.set_offer_active(offer_id, false).await.unwrap();

    let allocator = CodeAllocator::new(storage.pool());
    let hit = allocator
        .find_offer_by_title("Premium Voucher XL")
        .await
        .unwrap();
    assert!(hit.is_none());
}

#[tokio::test]
async fn ties_break_on_storage_order() {
    let (_dir, storage) = test_storage().await;
    storage.insert_offer("Key", "first", "f1").await.unwrap();
    storage.insert_offer("Key 10", "second", "f2").await.unwrap();

    let allocator = CodeAllocator::new(storage.pool());
    // Both offers' titles are substrings of the query; the lowest id wins.
    let hit = allocator.find_offer_by_title("Key 10 pcs").await.unwrap();
    assert_eq!(hit.unwrap().title, "Key");
}

#[tokio::test]
async fn blank_title_matches_nothing() {
    let (_dir, storage) = test_storage().await;
    storage.insert_offer("Key", "x", "y").await.unwrap();

    let allocator = CodeAllocator::new(storage.pool());
    assert!(allocator.find_offer_by_title("   ").await.unwrap().is_none());
}
