mod common;

use common::{RecordingRenderer, sample_cart, service_with};
use qris_checkout::domain::money::FeePercent;
use qris_checkout::domain::order::UserId;
use qris_checkout::domain::ports::{CheckoutStoreBox, SharedRenderer};
use qris_checkout::infrastructure::in_memory::{InMemoryCheckoutStore, RowCounts};
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn test_ports_as_trait_objects() {
    let store: CheckoutStoreBox = Box::new(InMemoryCheckoutStore::new());
    let renderer: SharedRenderer = Arc::new(RecordingRenderer::default());

    // Verify Send + Sync by moving the boxed port into a task
    let handle = tokio::spawn(async move {
        let tx = store.begin().await.unwrap();
        tx.rollback().await.unwrap();
        store.all_orders().await.unwrap().len()
    });
    assert_eq!(handle.await.unwrap(), 0);
    drop(renderer);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_are_isolated() {
    let store = InMemoryCheckoutStore::new();
    let renderer = Arc::new(RecordingRenderer::default());
    let service = Arc::new(service_with(store.clone(), renderer.clone()));

    let handles: Vec<_> = (1..=32)
        .map(|user| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .checkout(
                        &sample_cart(),
                        UserId(user),
                        FeePercent::new(dec!(0.5)).unwrap(),
                    )
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let placed = handle.await.unwrap();
        assert_eq!(placed.lines.len(), 2);
        assert!(placed.lines.iter().all(|l| l.order_id == placed.order.id));
        assert_eq!(placed.payment.order_id, placed.order.id);
        assert!(ids.insert(placed.order.id));
    }

    assert_eq!(
        store.row_counts().await,
        RowCounts {
            orders: 32,
            lines: 64,
            payments: 32
        }
    );
    let names: HashSet<_> = renderer.rendered().into_iter().collect();
    assert_eq!(names.len(), 32);
}
