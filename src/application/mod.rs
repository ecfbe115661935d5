//! Application layer: the checkout orchestrator and the order queries built on it.
//!
//! [`checkout::CheckoutService`] drives the domain ports. It owns no state of its
//! own beyond the store and renderer handles, so one instance serves any number
//! of concurrent checkouts.

pub mod checkout;
