use crate::domain::order::{OrderId, OrderStatus};
use crate::qris::tlv::TlvError;
use thiserror::Error;

/// Rejected caller input. Raised before any storage or rendering I/O.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("item {item_id} has quantity 0; quantities must be at least 1")]
    ZeroQuantity { item_id: u64 },
    #[error("amount must not be negative")]
    NegativeAmount,
    #[error("fee percent must not be negative")]
    NegativeFee,
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("monetary value overflows the supported range")]
    Overflow,
}

/// A template or payload that does not survive a strict TLV check.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("merchant template is empty")]
    EmptyTemplate,
    #[error("malformed TLV: {0}")]
    Malformed(#[from] TlvError),
    #[error("payload carries {0} transaction amount fields, expected exactly one")]
    AmountFieldCount(usize),
    #[error("payload amount {found} does not match expected amount {expected}")]
    AmountMismatch { expected: String, found: String },
    #[error("payload does not end with a checksum field")]
    MissingChecksum,
    #[error("checksum mismatch: payload carries {found}, computed {computed}")]
    ChecksumMismatch { found: String, computed: String },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("order status cannot change from {from} to {to}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("order {0} not found")]
    NotFound(OrderId),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid artifact name {0:?}")]
    InvalidName(String),
    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Broad classification handed to callers so they can decide between
/// "fix your input" and "try again".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidInput,
    Retryable,
    Integrity,
}

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("invalid checkout input: {0}")]
    InvalidInput(#[from] InputError),
    #[error("payload integrity check failed: {0}")]
    PayloadIntegrity(#[from] IntegrityError),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
    #[error("payload image render failed: {0}")]
    Render(#[from] RenderError),
}

impl CheckoutError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CheckoutError::InvalidInput(_) => FailureKind::InvalidInput,
            CheckoutError::PayloadIntegrity(_) => FailureKind::Integrity,
            // Status rules are business input, not transient storage trouble.
            CheckoutError::Storage(StoreError::InvalidTransition(_))
            | CheckoutError::Storage(StoreError::NotFound(_)) => FailureKind::InvalidInput,
            CheckoutError::Storage(_) | CheckoutError::Render(_) => FailureKind::Retryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Retryable
    }
}

#[derive(Error, Debug)]
pub enum CartReadError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid cart line: {0}")]
    Input(#[from] InputError),
}

pub type Result<T, E = CheckoutError> = std::result::Result<T, E>;
