//! Scoped transactions over the embedded storage engine.

use heed::{Env, RoTxn, RwTxn};
use tracing::{debug, warn};

/// Transaction misuse errors.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The transaction was already closed.
    #[error("transaction used after close")]
    Closed,

    /// Write access requested on a read-only transaction.
    #[error("write access on a read-only transaction")]
    ReadOnly,
}

enum Inner<'env> {
    ReadOnly(RoTxn<'env>),
    ReadWrite(RwTxn<'env>),
}

/// One unit of work against the storage engine.
///
/// The engine transaction begins on construction. [`Transaction::close`]
/// commits a read-write transaction and is idempotent; a transaction that
/// goes out of scope without being closed releases the engine handle and
/// discards any pending writes. Transactions are single-use.
///
/// The engine allows many concurrent read-only transactions but at most one
/// read-write transaction system-wide; beginning a second writer blocks
/// until the first commits or aborts.
pub struct Transaction<'env> {
    inner: Option<Inner<'env>>,
}

impl<'env> Transaction<'env> {
    /// Begin a read-only transaction.
    pub fn read_only(env: &'env Env) -> Result<Self, heed::Error> {
        let txn = env.read_txn()?;
        debug!("begin read-only transaction");
        Ok(Self {
            inner: Some(Inner::ReadOnly(txn)),
        })
    }

    /// Begin a read-write transaction.
    pub fn read_write(env: &'env Env) -> Result<Self, heed::Error> {
        let txn = env.write_txn()?;
        debug!("begin read-write transaction");
        Ok(Self {
            inner: Some(Inner::ReadWrite(txn)),
        })
    }

    /// Read handle, usable with either transaction kind.
    pub fn read(&self) -> Result<&RoTxn<'env>, TransactionError> {
        match self.inner.as_ref() {
            Some(Inner::ReadOnly(txn)) => Ok(txn),
            Some(Inner::ReadWrite(txn)) => Ok(&**txn),
            None => Err(TransactionError::Closed),
        }
    }

    /// Write handle, only available on a read-write transaction.
    pub fn write(&mut self) -> Result<&mut RwTxn<'env>, TransactionError> {
        match self.inner.as_mut() {
            Some(Inner::ReadWrite(txn)) => Ok(txn),
            Some(Inner::ReadOnly(_)) => Err(TransactionError::ReadOnly),
            None => Err(TransactionError::Closed),
        }
    }

    /// Whether the transaction is still open.
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Close the transaction, committing pending writes first.
    ///
    /// Idempotent: closing an already-closed transaction is a no-op.
    pub fn close(&mut self) -> Result<(), heed::Error> {
        match self.inner.take() {
            Some(Inner::ReadWrite(txn)) => {
                txn.commit()?;
                debug!("committed read-write transaction");
            }
            Some(Inner::ReadOnly(_)) => {
                debug!("released read-only transaction");
            }
            None => {}
        }
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if let Some(Inner::ReadWrite(_)) = self.inner.take() {
            warn!("read-write transaction dropped without close; discarding writes");
        }
    }
}
