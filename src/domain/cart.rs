use super::money::{Amount, FeePercent};
use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One catalog item in a cart, with the title and price seen when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: ItemId,
    pub title: String,
    pub price: Amount,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(item_id: ItemId, title: impl Into<String>, price: Amount, quantity: u32) -> Self {
        Self {
            item_id,
            title: title.into(),
            price,
            quantity,
        }
    }

    pub fn line_subtotal(&self) -> Result<Amount, InputError> {
        self.price.checked_mul(self.quantity)
    }
}

/// A shopping cart handed to checkout as a plain value.
///
/// The cart is never stored by this crate; whoever owns the session keeps it
/// and clears it after a successful checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a line, merging quantities when the item is already in the cart.
    /// The first title and price seen for an item are kept.
    pub fn add(&mut self, line: CartLine) -> Result<(), InputError> {
        if line.quantity == 0 {
            return Err(InputError::ZeroQuantity {
                item_id: line.item_id.0,
            });
        }
        match self.lines.iter_mut().find(|l| l.item_id == line.item_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or(InputError::Overflow)?;
            }
            None => self.lines.push(line),
        }
        Ok(())
    }

    pub fn remove(&mut self, item_id: ItemId) -> Option<CartLine> {
        let index = self.lines.iter().position(|l| l.item_id == item_id)?;
        Some(self.lines.remove(index))
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Checks the checkout preconditions: at least one line, no zero quantity.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.lines.is_empty() {
            return Err(InputError::EmptyCart);
        }
        if let Some(line) = self.lines.iter().find(|l| l.quantity == 0) {
            return Err(InputError::ZeroQuantity {
                item_id: line.item_id.0,
            });
        }
        Ok(())
    }

    pub fn subtotal(&self) -> Result<Amount, InputError> {
        self.lines
            .iter()
            .try_fold(Amount::ZERO, |acc, line| acc.checked_add(line.line_subtotal()?))
    }

    pub fn totals(&self, fee_percent: FeePercent) -> Result<CheckoutTotals, InputError> {
        self.validate()?;
        let subtotal = self.subtotal()?;
        let fee_amount = fee_percent.fee_for(subtotal)?;
        Ok(CheckoutTotals {
            subtotal,
            fee_percent,
            fee_amount,
            grand_total: subtotal.checked_add(fee_amount)?,
        })
    }
}

/// Lines are taken as given; [`Cart::validate`] still applies at checkout.
impl From<Vec<CartLine>> for Cart {
    fn from(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutTotals {
    pub subtotal: Amount,
    pub fee_percent: FeePercent,
    pub fee_amount: Amount,
    pub grand_total: Amount,
}
