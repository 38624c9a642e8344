use crate::domain::payment::{Payment, PaymentStatus, TerminalStatus};
use crate::domain::ports::PaymentStore;
use crate::error::StoreError;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, TransactionDB, TransactionDBOptions};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Column Family for payment records, keyed by identifier.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family enforcing reference uniqueness: reference -> identifier.
pub const CF_REFERENCES: &str = "references";

/// How long a transaction waits for a record lock before giving up.
const LOCK_TIMEOUT_MS: i64 = 5_000;

/// A persistent payment store on a pessimistic RocksDB `TransactionDB`.
///
/// Both writes run inside a RocksDB transaction that takes an exclusive key lock
/// with `get_for_update` before looking at the data, so the uniqueness check on
/// a reference and the `PENDING` guard on a record are evaluated under the same
/// lock as the write that follows them.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<TransactionDB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<TransactionDB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "payments" and "references" column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(LOCK_TIMEOUT_MS);

        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());
        let cf_references = ColumnFamilyDescriptor::new(CF_REFERENCES, Options::default());

        let db = TransactionDB::open_cf_descriptors(
            &opts,
            &txn_opts,
            path,
            vec![cf_payments, cf_references],
        )
        .map_err(unavailable)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Runs blocking RocksDB work off the async executor.
    async fn blocking<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&TransactionDB) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || work(db.as_ref()))
            .await
            .map_err(|e| StoreError::Unavailable(format!("storage task failed: {}", e)))?
    }
}

fn unavailable(e: rocksdb::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn column<'a>(db: &'a TransactionDB, name: &str) -> Result<&'a ColumnFamily, StoreError> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::Unavailable(format!("{} column family not found", name)))
}

fn encode(payment: &Payment) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(payment)
        .map_err(|e| StoreError::Unavailable(format!("Serialization error: {}", e)))
}

fn decode(bytes: &[u8]) -> Result<Payment, StoreError> {
    serde_json::from_slice(bytes)
        .map_err(|e| StoreError::Unavailable(format!("Deserialization error: {}", e)))
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn create(&self, mut payment: Payment) -> Result<Payment, StoreError> {
        payment.status = PaymentStatus::Pending;
        payment.updated_at = payment.created_at;

        self.blocking(move |db| {
            let payments = column(db, CF_PAYMENTS)?;
            let references = column(db, CF_REFERENCES)?;

            let txn = db.transaction();
            // Locks the reference key even when absent, so a racing create waits
            // here and then sees our commit.
            if txn
                .get_for_update_cf(references, payment.reference.as_bytes(), true)
                .map_err(unavailable)?
                .is_some()
            {
                return Err(StoreError::DuplicateReference(payment.reference));
            }

            txn.put_cf(references, payment.reference.as_bytes(), payment.id.as_bytes())
                .map_err(unavailable)?;
            txn.put_cf(payments, payment.id.as_bytes(), encode(&payment)?)
                .map_err(unavailable)?;
            txn.commit().map_err(unavailable)?;
            Ok(payment)
        })
        .await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Payment, StoreError> {
        self.blocking(move |db| {
            let payments = column(db, CF_PAYMENTS)?;
            match db.get_cf(payments, id.as_bytes()).map_err(unavailable)? {
                Some(bytes) => decode(&bytes),
                None => Err(StoreError::NotFound(id)),
            }
        })
        .await
    }

    async fn reference_exists(&self, reference: &str) -> Result<bool, StoreError> {
        let reference = reference.to_owned();
        self.blocking(move |db| {
            let references = column(db, CF_REFERENCES)?;
            let result = db
                .get_cf(references, reference.as_bytes())
                .map_err(unavailable)?;
            Ok(result.is_some())
        })
        .await
    }

    async fn conditional_transition(
        &self,
        id: Uuid,
        target: TerminalStatus,
    ) -> Result<Payment, StoreError> {
        self.blocking(move |db| {
            let payments = column(db, CF_PAYMENTS)?;

            let txn = db.transaction();
            let bytes = txn
                .get_for_update_cf(payments, id.as_bytes(), true)
                .map_err(unavailable)?
                .ok_or(StoreError::NotFound(id))?;
            let mut payment = decode(&bytes)?;

            // Dropping `txn` without commit rolls back and releases the lock.
            payment
                .transition(target)
                .map_err(|status| StoreError::AlreadyProcessed { id, status })?;

            txn.put_cf(payments, id.as_bytes(), encode(&payment)?)
                .map_err(unavailable)?;
            txn.commit().map_err(unavailable)?;
            Ok(payment)
        })
        .await
    }
}
