use payflow::domain::payment::{Amount, Currency, Payment, PaymentStatus, TerminalStatus};
use payflow::domain::ports::{PaymentStore, PaymentStoreRef, TriggerPublisher, TriggerPublisherRef};
use payflow::domain::notice::TriggerNotice;
use payflow::infrastructure::broker::{BrokerPublisher, InMemoryBroker};
use payflow::infrastructure::in_memory::InMemoryPaymentStore;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_ports_as_trait_objects() {
    let store: PaymentStoreRef = Arc::new(InMemoryPaymentStore::new());
    let publisher: TriggerPublisherRef =
        Arc::new(BrokerPublisher::new(InMemoryBroker::with_payment_topology().unwrap()));

    let payment = Payment::new(Amount::new(dec!(100.0)).unwrap(), Currency::Usd, "REF-DYN");
    let id = payment.id;

    // Verify Send + Sync by spawning tasks
    let store_handle = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store.create(payment).await.unwrap();
            store
                .conditional_transition(id, TerminalStatus::Success)
                .await
                .unwrap()
        })
    };
    let publish_handle =
        tokio::spawn(async move { publisher.publish(&TriggerNotice::new(id)).await });

    let transitioned = store_handle.await.unwrap();
    assert_eq!(transitioned.status, PaymentStatus::Success);
    assert!(publish_handle.await.unwrap().is_ok());
    assert_eq!(store.get_by_id(id).await.unwrap().status, PaymentStatus::Success);
}
