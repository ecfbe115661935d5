use super::order::{
    ArtifactPath, NewOrder, Order, OrderId, OrderLine, OrderStatus, Payment, UserId,
};
use crate::error::{RenderError, StoreError};
use crate::qris::Payload;
use async_trait::async_trait;
use std::sync::Arc;

/// Durable storage for orders, their lines and payments.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Opens a unit of work. Writes made through the handle stay invisible to
    /// every reader until [`CheckoutTransaction::commit`] succeeds.
    async fn begin(&self) -> Result<Box<dyn CheckoutTransaction>, StoreError>;

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, StoreError>;

    async fn payment(&self, id: OrderId) -> Result<Option<Payment>, StoreError>;

    /// Orders of one user, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError>;

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Moves an order to `status` and its payment along with it, atomically.
    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, StoreError>;
}

/// A unit of work opened by [`CheckoutStore::begin`].
///
/// Dropping the handle without committing discards every staged write, so a
/// cancelled or panicking caller can never leave a partial order behind.
#[async_trait]
pub trait CheckoutTransaction: Send {
    /// Stages a pending order and returns it with its assigned id.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, StoreError>;

    async fn insert_order_line(&mut self, line: OrderLine) -> Result<(), StoreError>;

    async fn insert_payment(&mut self, payment: Payment) -> Result<(), StoreError>;

    async fn update_order_payload(
        &mut self,
        id: OrderId,
        payload: &Payload,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Turns a payload into a scannable image stored at a public path.
#[async_trait]
pub trait PayloadRenderer: Send + Sync {
    /// Renders `payload` under `name_hint`. Rendering again with the same hint
    /// overwrites the earlier artifact.
    async fn render(&self, payload: &Payload, name_hint: &str)
    -> Result<ArtifactPath, RenderError>;

    /// Removes an artifact whose order was rolled back. Missing artifacts are fine.
    async fn discard(&self, artifact: &ArtifactPath) -> Result<(), RenderError>;
}

pub type CheckoutStoreBox = Box<dyn CheckoutStore>;
pub type SharedRenderer = Arc<dyn PayloadRenderer>;
