use crate::config::PayloadPolicy;
use crate::domain::cart::{Cart, CheckoutTotals};
use crate::domain::money::{Amount, FeePercent};
use crate::domain::order::{
    ArtifactPath, NewOrder, Order, OrderId, OrderLine, OrderStatus, Payment, PlacedOrder, UserId,
};
use crate::domain::ports::{
    CheckoutStoreBox, CheckoutTransaction, PayloadRenderer, SharedRenderer,
};
use crate::domain::reporting::{MonthlyRevenue, monthly_revenue};
use crate::error::{IntegrityError, RenderError, Result, StoreError};
use crate::qris::{Payload, build_dynamic_payload, inspect_template, verify_payload};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{Span, debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct CheckoutSettings {
    /// Static merchant template the dynamic payloads are derived from.
    pub merchant_template: String,
    pub payload_policy: PayloadPolicy,
}

/// Places orders: totals, payload, image and the three row kinds, all or nothing.
///
/// Each checkout runs on its own store transaction. Nothing is shared between
/// concurrent checkouts except the store itself.
pub struct CheckoutService {
    store: CheckoutStoreBox,
    renderer: SharedRenderer,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(store: CheckoutStoreBox, renderer: SharedRenderer, settings: CheckoutSettings) -> Self {
        Self {
            store,
            renderer,
            settings,
        }
    }

    /// Places an order for `cart` on behalf of `user_id`.
    ///
    /// Input is validated before any I/O. After that every step runs inside
    /// one store transaction; on failure it is rolled back and any image
    /// already rendered is discarded, also when the returned future is dropped
    /// before it completes. The cart is only borrowed, so the caller still
    /// holds it unchanged for a retry.
    #[tracing::instrument(
        skip(self, cart),
        fields(user_id = %user_id, lines = cart.len(), order_id = tracing::field::Empty)
    )]
    pub async fn checkout(
        &self,
        cart: &Cart,
        user_id: UserId,
        fee_percent: FeePercent,
    ) -> Result<PlacedOrder> {
        let totals = cart.totals(fee_percent)?;
        debug!(subtotal = %totals.subtotal, fee = %totals.fee_amount, "computed totals");

        let mut tx = self.store.begin().await?;
        let mut rendered = PendingImage::new(Arc::clone(&self.renderer));

        match self
            .write_order(tx.as_mut(), cart, user_id, totals, &mut rendered)
            .await
        {
            Ok(placed) => match tx.commit().await {
                Ok(()) => {
                    rendered.keep();
                    info!(
                        order_id = %placed.order.id,
                        grand_total = %placed.order.grand_total,
                        "order placed"
                    );
                    Ok(placed)
                }
                Err(err) => {
                    warn!(error = %err, "commit failed");
                    rendered.discard().await;
                    Err(err.into())
                }
            },
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed; staged rows dropped with the handle");
                }
                rendered.discard().await;
                warn!(error = %err, "checkout rolled back");
                Err(err)
            }
        }
    }

    async fn write_order(
        &self,
        tx: &mut dyn CheckoutTransaction,
        cart: &Cart,
        user_id: UserId,
        totals: CheckoutTotals,
        rendered: &mut PendingImage,
    ) -> Result<PlacedOrder> {
        let mut order = tx
            .insert_order(NewOrder {
                user_id,
                totals,
                created_at: Utc::now(),
            })
            .await?;
        Span::current().record("order_id", tracing::field::display(order.id));

        let mut lines = Vec::with_capacity(cart.len());
        for cart_line in cart.lines() {
            let line = OrderLine::snapshot(order.id, cart_line)?;
            tx.insert_order_line(line.clone()).await?;
            lines.push(line);
        }

        let payload = build_dynamic_payload(&self.settings.merchant_template, order.grand_total);
        self.check_payload(&payload, order.grand_total)?;

        let image = rendered
            .render(&payload, &format!("order-{}", order.id))
            .await?;

        let payment = Payment::qris(&order, payload.clone(), image);
        tx.insert_payment(payment.clone()).await?;
        tx.update_order_payload(order.id, &payload).await?;
        order.payload = Some(payload);

        Ok(PlacedOrder {
            order,
            lines,
            payment,
        })
    }

    fn check_payload(&self, payload: &Payload, expected: Amount) -> Result<(), IntegrityError> {
        let outcome = inspect_template(&self.settings.merchant_template)
            .and_then(|_| verify_payload(payload.as_str()))
            .and_then(|verified| verified.ensure_amount(expected));

        match (outcome, self.settings.payload_policy) {
            (Ok(()), _) => Ok(()),
            (Err(err), PayloadPolicy::Strict) => Err(err),
            (Err(err), PayloadPolicy::Lenient) => {
                warn!(error = %err, "payload failed integrity check; keeping it under lenient policy");
                Ok(())
            }
        }
    }

    /// An order together with its lines and payment.
    pub async fn order(&self, id: OrderId) -> Result<Option<PlacedOrder>> {
        let Some(order) = self.store.order(id).await? else {
            return Ok(None);
        };
        let lines = self.store.order_lines(id).await?;
        let payment = self
            .store
            .payment(id)
            .await?
            .ok_or_else(|| StoreError::Constraint(format!("order {id} has no payment")))?;
        Ok(Some(PlacedOrder {
            order,
            lines,
            payment,
        }))
    }

    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.store.orders_for_user(user_id).await?)
    }

    /// Every order, newest first.
    pub async fn all_orders(&self) -> Result<Vec<Order>> {
        let mut orders = self.store.all_orders().await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    pub async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let order = self.store.set_status(id, status).await?;
        info!(order_id = %id, status = %status, "order status updated");
        Ok(order)
    }

    pub async fn monthly_revenue(&self, since: DateTime<Utc>) -> Result<Vec<MonthlyRevenue>> {
        let orders = self.store.all_orders().await?;
        Ok(monthly_revenue(&orders, since)?)
    }
}

/// An image rendered for a checkout that has not committed yet.
///
/// Dropped while still holding an artifact, e.g. when the checkout future is
/// cancelled, it schedules the discard on the current runtime.
struct PendingImage {
    renderer: SharedRenderer,
    artifact: Option<ArtifactPath>,
}

impl PendingImage {
    fn new(renderer: SharedRenderer) -> Self {
        Self {
            renderer,
            artifact: None,
        }
    }

    async fn render(
        &mut self,
        payload: &Payload,
        name_hint: &str,
    ) -> Result<ArtifactPath, RenderError> {
        let image = self.renderer.render(payload, name_hint).await?;
        self.artifact = Some(image.clone());
        Ok(image)
    }

    /// The order committed; the image now belongs to it.
    fn keep(mut self) {
        self.artifact = None;
    }

    async fn discard(mut self) {
        if let Some(artifact) = self.artifact.take() {
            discard_image(self.renderer.as_ref(), artifact).await;
        }
    }
}

impl Drop for PendingImage {
    fn drop(&mut self) {
        let Some(artifact) = self.artifact.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let renderer = Arc::clone(&self.renderer);
                handle.spawn(async move { discard_image(renderer.as_ref(), artifact).await });
            }
            Err(_) => warn!(artifact = %artifact, "no runtime left to discard orphaned image"),
        }
    }
}

async fn discard_image(renderer: &dyn PayloadRenderer, artifact: ArtifactPath) {
    if let Err(err) = renderer.discard(&artifact).await {
        warn!(artifact = %artifact, error = %err, "failed to discard orphaned image");
    }
}
