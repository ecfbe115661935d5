use crate::domain::order::{Order, OrderId, OrderLine, Payment};
use crate::error::StoreError;
use crate::qris::Payload;

/// Rows written through one open transaction, held until commit.
///
/// Lines, payments and payload updates may only reference orders staged in
/// the same transaction; committed orders are out of reach until commit.
#[derive(Debug, Default)]
pub(crate) struct StagedCheckout {
    pub orders: Vec<Order>,
    pub lines: Vec<OrderLine>,
    pub payments: Vec<Payment>,
}

impl StagedCheckout {
    pub fn stage_order(&mut self, order: Order) {
        self.orders.push(order);
    }

    pub fn stage_line(&mut self, line: OrderLine) -> Result<(), StoreError> {
        self.require_order(line.order_id)?;
        self.lines.push(line);
        Ok(())
    }

    pub fn stage_payment(&mut self, payment: Payment) -> Result<(), StoreError> {
        self.require_order(payment.order_id)?;
        if self.payments.iter().any(|p| p.order_id == payment.order_id) {
            return Err(StoreError::Constraint(format!(
                "order {} already has a payment",
                payment.order_id
            )));
        }
        self.payments.push(payment);
        Ok(())
    }

    pub fn set_payload(&mut self, id: OrderId, payload: &Payload) -> Result<(), StoreError> {
        let order = self
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound(id))?;
        order.payload = Some(payload.clone());
        Ok(())
    }

    fn require_order(&self, id: OrderId) -> Result<(), StoreError> {
        if self.orders.iter().any(|o| o.id == id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!(
                "order {id} is not part of this transaction"
            )))
        }
    }
}

/// Newest first; ids break ties between orders created in the same instant.
pub(crate) fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}
