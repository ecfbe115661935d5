use super::staging::{StagedCheckout, sort_newest_first};
use crate::domain::order::{NewOrder, Order, OrderId, OrderLine, OrderStatus, Payment, UserId};
use crate::domain::ports::{CheckoutStore, CheckoutTransaction};
use crate::error::StoreError;
use crate::qris::Payload;
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Column Family for orders, keyed by big-endian order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family for order lines, keyed by order id then line number.
pub const CF_ORDER_LINES: &str = "order_lines";
/// Column Family for payments, keyed by order id.
pub const CF_PAYMENTS: &str = "payments";

/// A persistent store implementation using RocksDB.
///
/// A checkout's rows are written with a single `WriteBatch`, which RocksDB
/// applies atomically. Commits and status updates are serialized through a
/// mutex so the duplicate-order check and the write cannot interleave.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbCheckoutStore {
    db: Arc<DB>,
    last_id: Arc<AtomicU64>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbCheckoutStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Creates the order, line and payment column families when missing and
    /// resumes order ids after the highest one already stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_ORDERS, CF_ORDER_LINES, CF_PAYMENTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let store = Self {
            db: Arc::new(db),
            last_id: Arc::new(AtomicU64::new(0)),
            write_lock: Arc::new(Mutex::new(())),
        };
        let last = store.last_order_id()?;
        store.last_id.store(last, Ordering::SeqCst);
        Ok(store)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Backend(format!("{name} column family not found")))
    }

    fn last_order_id(&self) -> Result<u64, StoreError> {
        let cf = self.cf(CF_ORDERS)?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (key, _) = item?;
                decode_id(&key)
            }
            None => Ok(0),
        }
    }

    fn next_id(&self) -> OrderId {
        OrderId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.db.get_pinned_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_orders(&self) -> Result<Vec<Order>, StoreError> {
        let cf = self.cf(CF_ORDERS)?;
        let mut orders = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            orders.push(serde_json::from_slice(&value)?);
        }
        Ok(orders)
    }

    async fn apply(&self, staged: StagedCheckout) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let orders_cf = self.cf(CF_ORDERS)?;
        let lines_cf = self.cf(CF_ORDER_LINES)?;
        let payments_cf = self.cf(CF_PAYMENTS)?;
        let mut batch = WriteBatch::default();

        for order in &staged.orders {
            let key = order.id.0.to_be_bytes();
            if self.db.get_pinned_cf(orders_cf, key)?.is_some() {
                return Err(StoreError::Constraint(format!(
                    "order {} already exists",
                    order.id
                )));
            }
            batch.put_cf(orders_cf, key, to_json(order)?);
        }
        let mut line_numbers = std::collections::HashMap::<OrderId, u32>::new();
        for line in &staged.lines {
            let number = line_numbers.entry(line.order_id).or_default();
            batch.put_cf(lines_cf, line_key(line.order_id, *number), to_json(line)?);
            *number += 1;
        }
        for payment in &staged.payments {
            batch.put_cf(payments_cf, payment.order_id.0.to_be_bytes(), to_json(payment)?);
        }

        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl CheckoutStore for RocksDbCheckoutStore {
    async fn begin(&self) -> Result<Box<dyn CheckoutTransaction>, StoreError> {
        Ok(Box::new(RocksDbTransaction {
            store: self.clone(),
            staged: StagedCheckout::default(),
        }))
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.get_json(CF_ORDERS, &id.0.to_be_bytes())
    }

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        let cf = self.cf(CF_ORDER_LINES)?;
        let prefix = id.0.to_be_bytes();
        let mut lines = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            lines.push(serde_json::from_slice(&value)?);
        }
        Ok(lines)
    }

    async fn payment(&self, id: OrderId) -> Result<Option<Payment>, StoreError> {
        self.get_json(CF_PAYMENTS, &id.0.to_be_bytes())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .scan_orders()?
            .into_iter()
            .filter(|o| o.user_id == user_id)
            .collect();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.scan_orders()
    }

    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, StoreError> {
        let _guard = self.write_lock.lock().await;
        let key = id.0.to_be_bytes();

        let mut order: Order = self
            .get_json(CF_ORDERS, &key)?
            .ok_or(StoreError::NotFound(id))?;
        order.transition_to(status)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_ORDERS)?, key, to_json(&order)?);
        if let Some(mut payment) = self.get_json::<Payment>(CF_PAYMENTS, &key)? {
            payment.status = status.payment_status();
            batch.put_cf(self.cf(CF_PAYMENTS)?, key, to_json(&payment)?);
        }
        self.db.write(batch)?;
        Ok(order)
    }
}

struct RocksDbTransaction {
    store: RocksDbCheckoutStore,
    staged: StagedCheckout,
}

#[async_trait]
impl CheckoutTransaction for RocksDbTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, StoreError> {
        let order = Order::create(self.store.next_id(), order);
        self.staged.stage_order(order.clone());
        Ok(order)
    }

    async fn insert_order_line(&mut self, line: OrderLine) -> Result<(), StoreError> {
        self.staged.stage_line(line)
    }

    async fn insert_payment(&mut self, payment: Payment) -> Result<(), StoreError> {
        self.staged.stage_payment(payment)
    }

    async fn update_order_payload(
        &mut self,
        id: OrderId,
        payload: &Payload,
    ) -> Result<(), StoreError> {
        self.staged.set_payload(id, payload)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let RocksDbTransaction { store, staged } = *self;
        store.apply(staged).await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(value)?)
}

fn line_key(order_id: OrderId, number: u32) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&order_id.0.to_be_bytes());
    key[8..].copy_from_slice(&number.to_be_bytes());
    key
}

fn decode_id(key: &[u8]) -> Result<u64, StoreError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StoreError::Backend(format!("corrupt order key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}
