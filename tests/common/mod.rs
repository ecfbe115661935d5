#![allow(dead_code)]

use async_trait::async_trait;
use qris_checkout::application::checkout::{CheckoutService, CheckoutSettings};
use qris_checkout::config::PayloadPolicy;
use qris_checkout::domain::cart::{Cart, CartLine, ItemId};
use qris_checkout::domain::money::Amount;
use qris_checkout::domain::order::{
    ArtifactPath, NewOrder, Order, OrderId, OrderLine, OrderStatus, Payment, UserId,
};
use qris_checkout::domain::ports::{CheckoutStore, CheckoutTransaction, PayloadRenderer};
use qris_checkout::error::{RenderError, StoreError};
use qris_checkout::infrastructure::in_memory::InMemoryCheckoutStore;
use qris_checkout::qris::Payload;
use std::sync::{Arc, Mutex};

/// Merchant template body without its checksum field.
pub const BODY: &str = "00020101021126660014ID.CO.QRIS.WWW01189360091530225914810215ID10200176114730303UMI5204581253033605802ID5910TOKOBERKAH6007BANDUNG61054011162070703A01";

pub fn static_template() -> String {
    format!("{BODY}63041FCC")
}

/// 3 x 10000 + 1 x 2500 = 32500.
pub fn sample_cart() -> Cart {
    Cart::from(vec![
        CartLine::new(ItemId(1), "Nasi Goreng", Amount::new(10000), 3),
        CartLine::new(ItemId(2), "Es Teh", Amount::new(2500), 1),
    ])
}

pub fn settings() -> CheckoutSettings {
    CheckoutSettings {
        merchant_template: static_template(),
        payload_policy: PayloadPolicy::Strict,
    }
}

pub fn service_with(
    store: impl CheckoutStore + 'static,
    renderer: Arc<dyn PayloadRenderer>,
) -> CheckoutService {
    CheckoutService::new(Box::new(store), renderer, settings())
}

/// Renders nothing, remembers every name it was asked for and every discard.
#[derive(Default)]
pub struct RecordingRenderer {
    pub rendered: Mutex<Vec<String>>,
    pub discarded: Mutex<Vec<String>>,
}

impl RecordingRenderer {
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }

    pub fn discarded(&self) -> Vec<String> {
        self.discarded.lock().unwrap().clone()
    }
}

#[async_trait]
impl PayloadRenderer for RecordingRenderer {
    async fn render(&self, _payload: &Payload, name_hint: &str) -> Result<ArtifactPath, RenderError> {
        self.rendered.lock().unwrap().push(name_hint.to_owned());
        Ok(ArtifactPath(format!("/qrs/{name_hint}.png")))
    }

    async fn discard(&self, artifact: &ArtifactPath) -> Result<(), RenderError> {
        self.discarded.lock().unwrap().push(artifact.as_str().to_owned());
        Ok(())
    }
}

pub struct FailingRenderer;

#[async_trait]
impl PayloadRenderer for FailingRenderer {
    async fn render(&self, _payload: &Payload, _name_hint: &str) -> Result<ArtifactPath, RenderError> {
        Err(RenderError::Io(std::io::Error::other("disk full")))
    }

    async fn discard(&self, _artifact: &ArtifactPath) -> Result<(), RenderError> {
        Ok(())
    }
}

/// The transaction step a [`FailingStore`] breaks on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    InsertLine,
    InsertPayment,
    UpdatePayload,
    Commit,
    /// Never completes the payment insert.
    StallPayment,
}

/// An in-memory store whose transactions fail (or stall) at one chosen step.
#[derive(Clone)]
pub struct FailingStore {
    pub inner: InMemoryCheckoutStore,
    pub fail_at: FailAt,
}

impl FailingStore {
    pub fn new(fail_at: FailAt) -> Self {
        Self {
            inner: InMemoryCheckoutStore::new(),
            fail_at,
        }
    }

    fn check(fail_at: FailAt, step: FailAt) -> Result<(), StoreError> {
        if fail_at == step {
            Err(StoreError::Backend(format!("injected failure at {step:?}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CheckoutStore for FailingStore {
    async fn begin(&self) -> Result<Box<dyn CheckoutTransaction>, StoreError> {
        Ok(Box::new(FailingTransaction {
            inner: self.inner.begin().await?,
            fail_at: self.fail_at,
        }))
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.inner.order(id).await
    }

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        self.inner.order_lines(id).await
    }

    async fn payment(&self, id: OrderId) -> Result<Option<Payment>, StoreError> {
        self.inner.payment(id).await
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        self.inner.orders_for_user(user_id).await
    }

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.inner.all_orders().await
    }

    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, StoreError> {
        self.inner.set_status(id, status).await
    }
}

struct FailingTransaction {
    inner: Box<dyn CheckoutTransaction>,
    fail_at: FailAt,
}

#[async_trait]
impl CheckoutTransaction for FailingTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, StoreError> {
        self.inner.insert_order(order).await
    }

    async fn insert_order_line(&mut self, line: OrderLine) -> Result<(), StoreError> {
        FailingStore::check(self.fail_at, FailAt::InsertLine)?;
        self.inner.insert_order_line(line).await
    }

    async fn insert_payment(&mut self, payment: Payment) -> Result<(), StoreError> {
        FailingStore::check(self.fail_at, FailAt::InsertPayment)?;
        if self.fail_at == FailAt::StallPayment {
            std::future::pending::<()>().await;
        }
        self.inner.insert_payment(payment).await
    }

    async fn update_order_payload(
        &mut self,
        id: OrderId,
        payload: &Payload,
    ) -> Result<(), StoreError> {
        FailingStore::check(self.fail_at, FailAt::UpdatePayload)?;
        self.inner.update_order_payload(id, payload).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        FailingStore::check(self.fail_at, FailAt::Commit)?;
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}
