//! Runtime settings, read from flags or the environment (optionally via `.env`).

use crate::application::checkout::CheckoutSettings;
use crate::domain::money::FeePercent;
use crate::infrastructure::qr_png::PngQrRenderer;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// What checkout does when a built payload fails the integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PayloadPolicy {
    /// Fail the checkout and roll back.
    #[default]
    Strict,
    /// Log a warning and keep the order.
    Lenient,
}

#[derive(Debug, Clone, Args)]
pub struct CheckoutConfig {
    /// Static QRIS merchant payload
    #[arg(long = "template", env = "QRIS_STATIC", default_value = "", hide_env_values = true)]
    pub merchant_template: String,

    /// Platform fee in percent of the subtotal
    #[arg(long, env = "PLATFORM_FEE", default_value = "0.5")]
    pub fee_percent: FeePercent,

    /// Directory the QR images are written to
    #[arg(long, env = "QR_OUTPUT_DIR", default_value = "public/qrs")]
    pub qr_output_dir: PathBuf,

    /// Minimum QR image width and height in pixels
    #[arg(long, env = "QR_SIZE", default_value_t = PngQrRenderer::DEFAULT_SIZE)]
    pub qr_size: u32,

    /// Public URL prefix under which the QR directory is served
    #[arg(long, env = "QR_PUBLIC_PREFIX", default_value = "/qrs")]
    pub qr_public_prefix: String,

    #[arg(long, value_enum, env = "PAYLOAD_POLICY", default_value_t = PayloadPolicy::Strict)]
    pub payload_policy: PayloadPolicy,
}

impl CheckoutConfig {
    pub fn settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            merchant_template: self.merchant_template.clone(),
            payload_policy: self.payload_policy,
        }
    }

    pub fn renderer(&self) -> PngQrRenderer {
        PngQrRenderer::new(&self.qr_output_dir, &self.qr_public_prefix).with_size(self.qr_size)
    }
}

#[derive(Debug, Clone, Args)]
pub struct StorageConfig {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "CHECKOUT_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,
}
