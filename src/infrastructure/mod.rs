//! Adapters behind the domain ports: order storage and payload image rendering.

pub mod in_memory;
pub mod qr_png;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;

mod staging;
