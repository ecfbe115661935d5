//! QRIS dynamic payload codec: TLV handling and the CRC-16 checksum.
//!
//! Everything here is pure and free of shared state.

pub mod crc;
pub mod payload;
pub mod tlv;

pub use crc::{Checksum, crc16_ccitt};
pub use payload::{Payload, VerifiedPayload, build_dynamic_payload, inspect_template, verify_payload};
