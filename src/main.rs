use chrono::{DateTime, Months, Utc};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr, miette};
use qris_checkout::application::checkout::{CheckoutService, CheckoutSettings};
use qris_checkout::config::{CheckoutConfig, StorageConfig};
use qris_checkout::domain::money::Amount;
use qris_checkout::domain::order::{OrderId, OrderStatus, UserId};
use qris_checkout::domain::ports::CheckoutStoreBox;
use qris_checkout::infrastructure::in_memory::InMemoryCheckoutStore;
use qris_checkout::infrastructure::qr_png::PngQrRenderer;
#[cfg(feature = "storage-rocksdb")]
use qris_checkout::infrastructure::rocksdb::RocksDbCheckoutStore;
use qris_checkout::interfaces::csv::cart_reader::CartReader;
use qris_checkout::qris::{build_dynamic_payload, verify_payload};
use serde::Serialize;
use std::fs::File;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
#[cfg(not(feature = "storage-rocksdb"))]
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    storage: StorageConfig,
}

#[derive(Subcommand)]
enum Command {
    /// Print the dynamic payload for an amount
    Payload {
        #[arg(long)]
        amount: Amount,

        /// Static QRIS merchant payload
        #[arg(long, env = "QRIS_STATIC", default_value = "", hide_env_values = true)]
        template: String,
    },
    /// Check a payload's checksum and print its amount
    Verify { payload: String },
    /// Place an order for the cart in a CSV file
    Checkout {
        /// Cart CSV with columns item_id, title, price, quantity
        cart: PathBuf,

        #[arg(long)]
        user: u64,

        #[command(flatten)]
        config: CheckoutConfig,
    },
    /// List a user's orders, or every order with --all, newest first
    Orders {
        #[arg(long, required_unless_present = "all", conflicts_with = "all")]
        user: Option<u64>,

        #[arg(long)]
        all: bool,
    },
    /// Show one order with its lines and payment
    Order { id: u64 },
    /// Move an order to paid, failed or cancelled
    Status { order: u64, status: OrderStatus },
    /// Gross, fee and net per month
    Revenue {
        #[arg(long, default_value_t = 6)]
        months: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Payload { amount, template } => {
            println!("{}", build_dynamic_payload(&template, amount));
        }
        Command::Verify { payload } => {
            let verified = verify_payload(payload.trim()).into_diagnostic()?;
            println!("{}", verified.amount());
        }
        Command::Checkout { cart, user, config } => {
            let file = File::open(&cart)
                .into_diagnostic()
                .wrap_err_with(|| format!("cannot open cart file {}", cart.display()))?;
            let cart = CartReader::new(file).into_cart().into_diagnostic()?;

            let service = CheckoutService::new(
                open_store(&cli.storage)?,
                Arc::new(config.renderer()),
                config.settings(),
            );
            let placed = service
                .checkout(&cart, UserId(user), config.fee_percent)
                .await
                .into_diagnostic()
                .wrap_err("checkout failed")?;
            print_json(&placed)?;
        }
        Command::Orders { user, all: _ } => {
            let queries = service(&cli.storage)?;
            let orders = match user {
                Some(user) => queries.orders_for_user(UserId(user)).await,
                None => queries.all_orders().await,
            }
            .into_diagnostic()?;
            print_json(&orders)?;
        }
        Command::Order { id } => {
            let placed = service(&cli.storage)?
                .order(OrderId(id))
                .await
                .into_diagnostic()?
                .ok_or_else(|| miette!("order {id} not found"))?;
            print_json(&placed)?;
        }
        Command::Status { order, status } => {
            let order = service(&cli.storage)?
                .set_status(OrderId(order), status)
                .await
                .into_diagnostic()?;
            print_json(&order)?;
        }
        Command::Revenue { months } => {
            let since = Utc::now()
                .checked_sub_months(Months::new(months))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            let report = service(&cli.storage)?
                .monthly_revenue(since)
                .await
                .into_diagnostic()?;
            print_json(&report)?;
        }
    }

    Ok(())
}

/// A service for the read and status commands, which never render.
fn service(storage: &StorageConfig) -> Result<CheckoutService> {
    Ok(CheckoutService::new(
        open_store(storage)?,
        Arc::new(PngQrRenderer::new("public/qrs", "/qrs")),
        CheckoutSettings::default(),
    ))
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(storage: &StorageConfig) -> Result<CheckoutStoreBox> {
    match &storage.db_path {
        Some(path) => {
            let store = RocksDbCheckoutStore::open(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("cannot open database at {}", path.display()))?;
            Ok(Box::new(store))
        }
        None => Ok(Box::new(InMemoryCheckoutStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(storage: &StorageConfig) -> Result<CheckoutStoreBox> {
    if storage.db_path.is_some() {
        warn!(
            "persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled; falling back to in-memory storage"
        );
    }
    Ok(Box::new(InMemoryCheckoutStore::new()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}
