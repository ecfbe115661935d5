use super::staging::{StagedCheckout, sort_newest_first};
use crate::domain::order::{NewOrder, Order, OrderId, OrderLine, OrderStatus, Payment, UserId};
use crate::domain::ports::{CheckoutStore, CheckoutTransaction};
use crate::error::StoreError;
use crate::qris::Payload;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    orders: BTreeMap<OrderId, Order>,
    lines: BTreeMap<OrderId, Vec<OrderLine>>,
    payments: BTreeMap<OrderId, Payment>,
}

/// Number of committed rows per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCounts {
    pub orders: usize,
    pub lines: usize,
    pub payments: usize,
}

/// A thread-safe in-memory store for orders.
///
/// Transactions stage their rows privately and apply them under a single
/// write lock on commit, so readers see either none or all of a checkout.
/// `Clone` shares the underlying tables.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCheckoutStore {
    tables: Arc<RwLock<Tables>>,
    last_id: Arc<AtomicU64>,
}

impl InMemoryCheckoutStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn row_counts(&self) -> RowCounts {
        let tables = self.tables.read().await;
        RowCounts {
            orders: tables.orders.len(),
            lines: tables.lines.values().map(Vec::len).sum(),
            payments: tables.payments.len(),
        }
    }

    fn next_id(&self) -> OrderId {
        OrderId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl CheckoutStore for InMemoryCheckoutStore {
    async fn begin(&self) -> Result<Box<dyn CheckoutTransaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction {
            store: self.clone(),
            staged: StagedCheckout::default(),
        }))
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&id).cloned())
    }

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.lines.get(&id).cloned().unwrap_or_default())
    }

    async fn payment(&self, id: OrderId) -> Result<Option<Payment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.payments.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().cloned().collect())
    }

    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, StoreError> {
        let mut tables = self.tables.write().await;
        let order = tables.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        order.transition_to(status)?;
        let updated = order.clone();
        if let Some(payment) = tables.payments.get_mut(&id) {
            payment.status = status.payment_status();
        }
        Ok(updated)
    }
}

struct InMemoryTransaction {
    store: InMemoryCheckoutStore,
    staged: StagedCheckout,
}

#[async_trait]
impl CheckoutTransaction for InMemoryTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, StoreError> {
        let order = Order::create(self.store.next_id(), order);
        self.staged.stage_order(order.clone());
        Ok(order)
    }

    async fn insert_order_line(&mut self, line: OrderLine) -> Result<(), StoreError> {
        self.staged.stage_line(line)
    }

    async fn insert_payment(&mut self, payment: Payment) -> Result<(), StoreError> {
        self.staged.stage_payment(payment)
    }

    async fn update_order_payload(
        &mut self,
        id: OrderId,
        payload: &Payload,
    ) -> Result<(), StoreError> {
        self.staged.set_payload(id, payload)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction { store, staged } = *self;
        let mut tables = store.tables.write().await;

        if let Some(dup) = staged
            .orders
            .iter()
            .find(|o| tables.orders.contains_key(&o.id))
        {
            return Err(StoreError::Constraint(format!(
                "order {} already exists",
                dup.id
            )));
        }

        for order in staged.orders {
            tables.orders.insert(order.id, order);
        }
        for line in staged.lines {
            tables.lines.entry(line.order_id).or_default().push(line);
        }
        for payment in staged.payments {
            tables.payments.insert(payment.order_id, payment);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cart::{CartLine, CheckoutTotals, ItemId};
    use crate::domain::money::{Amount, FeePercent};
    use crate::domain::order::{ArtifactPath, PaymentStatus};
    use crate::qris::build_dynamic_payload;
    use chrono::Utc;

    fn new_order(user: u64) -> NewOrder {
        NewOrder {
            user_id: UserId(user),
            totals: CheckoutTotals {
                subtotal: Amount::new(1000),
                fee_percent: FeePercent::ZERO,
                fee_amount: Amount::ZERO,
                grand_total: Amount::new(1000),
            },
            created_at: Utc::now(),
        }
    }

    async fn stage_full_order(tx: &mut dyn CheckoutTransaction, user: u64) -> Order {
        let order = tx.insert_order(new_order(user)).await.unwrap();
        let cart_line = CartLine::new(ItemId(1), "Teh", Amount::new(1000), 1);
        tx.insert_order_line(OrderLine::snapshot(order.id, &cart_line).unwrap())
            .await
            .unwrap();
        let payload = build_dynamic_payload("", order.grand_total);
        tx.insert_payment(Payment::qris(
            &order,
            payload.clone(),
            ArtifactPath(format!("/qrs/order-{}.png", order.id)),
        ))
        .await
        .unwrap();
        tx.update_order_payload(order.id, &payload).await.unwrap();
        order
    }

    #[tokio::test]
    async fn test_commit_makes_rows_visible() {
        let store = InMemoryCheckoutStore::new();
        let mut tx = store.begin().await.unwrap();
        let order = stage_full_order(tx.as_mut(), 1).await;

        assert!(store.order(order.id).await.unwrap().is_none());
        assert_eq!(store.row_counts().await, RowCounts::default());

        tx.commit().await.unwrap();

        let stored = store.order(order.id).await.unwrap().unwrap();
        assert!(stored.payload.is_some());
        assert_eq!(store.order_lines(order.id).await.unwrap().len(), 1);
        assert_eq!(
            store.row_counts().await,
            RowCounts {
                orders: 1,
                lines: 1,
                payments: 1
            }
        );
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_rows() {
        let store = InMemoryCheckoutStore::new();

        let mut tx = store.begin().await.unwrap();
        stage_full_order(tx.as_mut(), 1).await;
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        stage_full_order(tx.as_mut(), 1).await;
        drop(tx);

        assert_eq!(store.row_counts().await, RowCounts::default());
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_rollback() {
        let store = InMemoryCheckoutStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx.insert_order(new_order(1)).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let second = tx.insert_order(new_order(1)).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_rows_must_reference_staged_order() {
        let store = InMemoryCheckoutStore::new();
        let mut tx = store.begin().await.unwrap();
        let cart_line = CartLine::new(ItemId(1), "Teh", Amount::new(1000), 1);
        let err = tx
            .insert_order_line(OrderLine::snapshot(OrderId(42), &cart_line).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_second_payment_is_rejected() {
        let store = InMemoryCheckoutStore::new();
        let mut tx = store.begin().await.unwrap();
        let order = stage_full_order(tx.as_mut(), 1).await;
        let payment = Payment::qris(
            &order,
            build_dynamic_payload("", order.grand_total),
            ArtifactPath("/qrs/dup.png".into()),
        );
        assert!(matches!(
            tx.insert_payment(payment).await,
            Err(StoreError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn test_set_status_moves_payment_too() {
        let store = InMemoryCheckoutStore::new();
        let mut tx = store.begin().await.unwrap();
        let order = stage_full_order(tx.as_mut(), 1).await;
        tx.commit().await.unwrap();

        let updated = store.set_status(order.id, OrderStatus::Paid).await.unwrap();
        assert_eq!(updated.status, OrderStatus::Paid);
        let payment = store.payment(order.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Paid);

        assert!(matches!(
            store.set_status(order.id, OrderStatus::Failed).await,
            Err(StoreError::InvalidTransition(_))
        ));
        assert!(matches!(
            store.set_status(OrderId(999), OrderStatus::Paid).await,
            Err(StoreError::NotFound(OrderId(999)))
        ));
    }

    #[tokio::test]
    async fn test_orders_for_user_newest_first() {
        let store = InMemoryCheckoutStore::new();
        for user in [1, 2, 1] {
            let mut tx = store.begin().await.unwrap();
            stage_full_order(tx.as_mut(), user).await;
            tx.commit().await.unwrap();
        }

        let orders = store.orders_for_user(UserId(1)).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders[0].id > orders[1].id);
        assert_eq!(store.all_orders().await.unwrap().len(), 3);
    }
}
