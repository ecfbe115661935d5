//! Domain model: money, carts, orders and the ports the application drives.

pub mod cart;
pub mod money;
pub mod order;
pub mod ports;
pub mod reporting;
