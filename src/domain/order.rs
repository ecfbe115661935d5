use super::cart::{CartLine, CheckoutTotals, ItemId};
use super::money::{Amount, FeePercent};
use crate::error::{InputError, InvalidTransition};
use crate::qris::Payload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl OrderStatus {
    /// Only pending orders move, and only to a terminal state.
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        self == OrderStatus::Pending && to != OrderStatus::Pending
    }

    pub fn payment_status(self) -> PaymentStatus {
        match self {
            OrderStatus::Pending => PaymentStatus::Unpaid,
            OrderStatus::Paid => PaymentStatus::Paid,
            OrderStatus::Failed | OrderStatus::Cancelled => PaymentStatus::Void,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "failed" => Ok(OrderStatus::Failed),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Qris,
}

/// Public path of a rendered payload image, e.g. `/qrs/order-12.png`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactPath(pub String);

impl ArtifactPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment, the stored file name.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order data known before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub totals: CheckoutTotals,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub subtotal: Amount,
    pub fee_percent: FeePercent,
    pub fee_amount: Amount,
    pub grand_total: Amount,
    pub status: OrderStatus,
    pub payload: Option<Payload>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// A pending order with no payload yet.
    pub fn create(id: OrderId, new: NewOrder) -> Self {
        Self {
            id,
            user_id: new.user_id,
            subtotal: new.totals.subtotal,
            fee_percent: new.totals.fee_percent,
            fee_amount: new.totals.fee_amount,
            grand_total: new.totals.grand_total,
            status: OrderStatus::Pending,
            payload: None,
            created_at: new.created_at,
        }
    }

    pub fn transition_to(&mut self, to: OrderStatus) -> Result<(), InvalidTransition> {
        if self.status.can_transition_to(to) {
            self.status = to;
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self.status,
                to,
            })
        }
    }
}

/// Snapshot of a cart line taken when the order is written. Later catalog
/// price or title changes never reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub item_id: ItemId,
    pub title_snapshot: String,
    pub price: Amount,
    pub quantity: u32,
    pub line_subtotal: Amount,
}

impl OrderLine {
    pub fn snapshot(order_id: OrderId, line: &CartLine) -> Result<Self, InputError> {
        Ok(Self {
            order_id,
            item_id: line.item_id,
            title_snapshot: line.title.clone(),
            price: line.price,
            quantity: line.quantity,
            line_subtotal: line.line_subtotal()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub payload: Payload,
    pub image: ArtifactPath,
}

impl Payment {
    pub fn qris(order: &Order, payload: Payload, image: ArtifactPath) -> Self {
        Self {
            order_id: order.id,
            method: PaymentMethod::Qris,
            amount: order.grand_total,
            status: PaymentStatus::Unpaid,
            payload,
            image,
        }
    }
}

/// An order with its lines and payment, as written by one checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub payment: Payment,
}
