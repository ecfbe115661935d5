//! Dynamic QRIS payments for a marketplace checkout.
//!
//! [`qris`] turns a merchant's static QRIS template into a per-order payload
//! carrying the exact amount. [`application::checkout::CheckoutService`] places
//! an order, its lines and its QRIS payment as one atomic unit, rendering the
//! payload to a PNG along the way.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod qris;
