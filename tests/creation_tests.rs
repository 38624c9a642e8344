use payflow::application::service::PaymentService;
use payflow::domain::payment::PaymentStatus;
use payflow::domain::ports::PaymentStore;
use payflow::error::PaymentError;
use payflow::infrastructure::in_memory::InMemoryPaymentStore;
use rust_decimal_macros::dec;
use std::sync::Arc;

mod common;
use common::{FailingPublisher, FlakyStore, RecordingPublisher, request};

#[tokio::test]
async fn test_create_then_lookup_is_pending() {
    let store = Arc::new(InMemoryPaymentStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let service = PaymentService::new(store.clone(), publisher.clone());

    let created = service
        .create_payment(request(dec!(100.50), "USD", "REF-001"))
        .await
        .unwrap();
    assert_eq!(created.status, PaymentStatus::Pending);
    assert_eq!(created.amount, dec!(100.50));
    assert_eq!(created.reference, "REF-001");

    let fetched = service.get_payment(created.id).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(publisher.count(), 1);
}

#[tokio::test]
async fn test_zero_amount_creates_nothing() {
    let store = Arc::new(InMemoryPaymentStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let service = PaymentService::new(store.clone(), publisher.clone());

    let err = service
        .create_payment(request(dec!(0), "USD", "REF-002"))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::InvalidAmount));
    assert!(err.is_rejection());
    assert!(store.is_empty().await);
    assert!(!store.reference_exists("REF-002").await.unwrap());
    assert_eq!(publisher.count(), 0);
}

#[tokio::test]
async fn test_duplicate_reference_conflicts() {
    let store = Arc::new(InMemoryPaymentStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let service = PaymentService::new(store.clone(), publisher.clone());

    service
        .create_payment(request(dec!(10), "ETB", "REF-003"))
        .await
        .unwrap();
    let err = service
        .create_payment(request(dec!(20), "USD", "REF-003"))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::ReferenceConflict(ref r) if r == "REF-003"));
    assert_eq!(store.len().await, 1);
    assert_eq!(publisher.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creation_with_one_reference() {
    let store = Arc::new(InMemoryPaymentStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let service = Arc::new(PaymentService::new(store.clone(), publisher.clone()));

    let attempts: Vec<_> = (0..16)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .create_payment(request(dec!(1), "USD", "REF-RACE"))
                    .await
            })
        })
        .collect();

    let mut created = 0;
    let mut conflicts = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => created += 1,
            Err(PaymentError::ReferenceConflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(store.len().await, 1);
    assert_eq!(publisher.count(), 1);
}

#[tokio::test]
async fn test_store_backstop_maps_to_conflict() {
    // The existence check misses the earlier payment, as if it lost a race.
    let store = Arc::new(FlakyStore {
        existence_check_blind: true,
        ..FlakyStore::default()
    });
    let service = PaymentService::new(store.clone(), Arc::new(RecordingPublisher::default()));

    service
        .create_payment(request(dec!(5), "USD", "REF-004"))
        .await
        .unwrap();
    let err = service
        .create_payment(request(dec!(5), "USD", "REF-004"))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::ReferenceConflict(_)));
    assert_eq!(store.inner.len().await, 1);
}

#[tokio::test]
async fn test_publish_failure_keeps_pending_record() {
    let store = Arc::new(InMemoryPaymentStore::new());
    let service = PaymentService::new(store.clone(), Arc::new(FailingPublisher));

    let err = service
        .create_payment(request(dec!(75), "ETB", "REF-005"))
        .await
        .unwrap_err();

    let payment = match err {
        PaymentError::CreatedButNotQueued { payment, .. } => payment,
        other => panic!("expected CreatedButNotQueued, got {:?}", other),
    };
    let stored = store.get_by_id(payment.id).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert_eq!(stored.reference, "REF-005");
}

#[tokio::test]
async fn test_storage_failure_before_write_is_distinct() {
    let store = Arc::new(FlakyStore {
        existence_check_down: true,
        ..FlakyStore::default()
    });
    let publisher = Arc::new(RecordingPublisher::default());
    let service = PaymentService::new(store.clone(), publisher.clone());

    let err = service
        .create_payment(request(dec!(1), "USD", "REF-006"))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::StorageUnavailable(_)));
    assert!(!err.is_rejection());
    assert!(store.inner.is_empty().await);
    assert_eq!(publisher.count(), 0);
}
