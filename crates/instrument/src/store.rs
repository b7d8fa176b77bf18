//! Instrument storage traits and implementations.
//!
//! This module defines the `InstrumentStore` trait that abstracts away storage details.
//! Every operation runs inside a caller-supplied transaction context (`Tx`) and
//! never begins or commits one itself, so callers can batch several calls into
//! one atomic unit.

use crate::error::{InstrumentError, InstrumentResult};
use crate::filter::InstrumentFilter;
use crate::types::{
    DataBlockStatus, DownloadJobStatus, IngestionJobStatus, Instrument, InstrumentId,
    InstrumentWithOverlay, InstrumentWithProduct, NewInstrument, ProductId, ProductRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Trait for instrument storage.
///
/// Singular lookups return `Ok(None)` when nothing matches and
/// `InstrumentError::Integrity` when more than one row does.
///
/// # Example
///
/// ```ignore
/// use data_instrument::{InstrumentStore, ProductId};
///
/// async fn example<S: InstrumentStore>(store: &S, tx: &mut S::Tx) -> InstrumentResult<()> {
///     if let Some(placeholder) = store.get_virtual_by_product_id(tx, ProductId::new(10)).await? {
///         println!("Virtual series: {}", placeholder.symbol);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait InstrumentStore: Send + Sync {
    /// Ambient transaction/session handle.
    type Tx: Send;

    /// Get an instrument by its unique ID.
    async fn get_by_id(
        &self,
        tx: &mut Self::Tx,
        id: InstrumentId,
    ) -> InstrumentResult<Option<Instrument>>;

    /// Get an instrument by symbol within a product.
    async fn get_by_symbol(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        symbol: &str,
    ) -> InstrumentResult<Option<Instrument>>;

    /// Get the product's virtual placeholder instrument.
    async fn get_virtual_by_product_id(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> InstrumentResult<Option<Instrument>>;

    /// List a product's instruments with their status overlay, by expiration date.
    ///
    /// With `stored_only`, keeps instruments whose data block has a status, plus
    /// the virtual instrument.
    async fn list_by_product_full(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        stored_only: bool,
    ) -> InstrumentResult<Vec<InstrumentWithOverlay>>;

    /// List instruments matching `filter` with their product codes, by name.
    async fn list_by_filter(
        &self,
        tx: &mut Self::Tx,
        filter: &InstrumentFilter,
    ) -> InstrumentResult<Vec<InstrumentWithProduct>>;

    /// List a product's non-continuous instruments, by expiration date.
    async fn list_non_continuous(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> InstrumentResult<Vec<Instrument>>;

    /// List a product's non-continuous instruments with their status overlay,
    /// by expiration date.
    async fn list_non_continuous_full(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> InstrumentResult<Vec<InstrumentWithOverlay>>;

    /// Insert a new instrument and return it with its assigned id.
    async fn create(
        &self,
        tx: &mut Self::Tx,
        instrument: &NewInstrument,
    ) -> InstrumentResult<Instrument>;

    /// Replace an existing instrument record.
    ///
    /// Never inserts: an id with no stored row gives `InstrumentError::NotFound`,
    /// where an upsert-style save would have created it. New rows go through
    /// [`create`](Self::create).
    async fn update(&self, tx: &mut Self::Tx, instrument: &Instrument) -> InstrumentResult<()>;

    /// Check if a symbol already exists within a product.
    async fn symbol_exists(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        symbol: &str,
    ) -> InstrumentResult<bool> {
        Ok(self.get_by_symbol(tx, product_id, symbol).await?.is_some())
    }
}

/// Collapse the rows of a unique lookup into zero-or-one.
pub fn at_most_one<T>(
    mut rows: Vec<T>,
    entity: &'static str,
    key: impl FnOnce() -> String,
) -> InstrumentResult<Option<T>> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        count => Err(InstrumentError::Integrity {
            entity,
            key: key(),
            count,
        }),
    }
}

/// Ascending expiration order with undated records last, as PostgreSQL sorts NULLs.
pub(crate) fn by_expiration(a: &Instrument, b: &Instrument) -> Ordering {
    match (a.expiration_date, b.expiration_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    last_instrument_id: i64,
    last_data_block_id: i64,
    instruments: BTreeMap<InstrumentId, Instrument>,
    products: BTreeMap<ProductId, ProductRecord>,
    data_blocks: BTreeMap<i64, DataBlockStatus>,
    download_jobs: BTreeMap<InstrumentId, DownloadJobStatus>,
    ingestion_jobs: BTreeMap<InstrumentId, IngestionJobStatus>,
}

impl Tables {
    fn overlay(&self, instrument: &Instrument) -> InstrumentWithOverlay {
        InstrumentWithOverlay {
            instrument: instrument.clone(),
            data_block: instrument
                .data_block_id
                .and_then(|id| self.data_blocks.get(&id))
                .cloned(),
            download_job: self.download_jobs.get(&instrument.id).cloned(),
            ingestion_job: self.ingestion_jobs.get(&instrument.id).cloned(),
        }
    }

    /// Instruments of a product in id order, which is the sort tie-breaker.
    fn of_product(&self, product_id: ProductId) -> impl Iterator<Item = &Instrument> {
        self.instruments
            .values()
            .filter(move |i| i.product_id == product_id)
    }

    fn check_symbol_free(
        &self,
        product_id: ProductId,
        symbol: &str,
        except: Option<InstrumentId>,
    ) -> InstrumentResult<()> {
        let taken = self
            .of_product(product_id)
            .any(|i| i.symbol == symbol && Some(i.id) != except);
        if taken {
            return Err(InstrumentError::Storage(format!(
                "duplicate key value violates unique constraint (data_product_id, symbol)=({}, {})",
                product_id, symbol
            )));
        }
        Ok(())
    }

    fn check_product_exists(&self, product_id: ProductId) -> InstrumentResult<()> {
        if !self.products.contains_key(&product_id) {
            return Err(InstrumentError::Storage(format!(
                "foreign key violation: data_product {} does not exist",
                product_id
            )));
        }
        Ok(())
    }
}

/// Snapshot transaction over an [`InMemoryInstrumentStore`].
///
/// Reads and writes see only this snapshot until
/// [`InMemoryInstrumentStore::commit`] publishes it.
#[derive(Debug, Clone)]
pub struct InMemoryTx {
    tables: Tables,
}

impl InMemoryTx {
    /// Register a data product.
    pub fn insert_product(&mut self, product: ProductRecord) {
        self.tables.products.insert(product.id, product);
    }

    /// Store a data block and return its id.
    pub fn insert_data_block(&mut self, block: DataBlockStatus) -> i64 {
        self.tables.last_data_block_id += 1;
        let id = self.tables.last_data_block_id;
        self.tables.data_blocks.insert(id, block);
        id
    }

    /// Attach (or replace) the download job of an instrument.
    pub fn put_download_job(&mut self, instrument_id: InstrumentId, job: DownloadJobStatus) {
        self.tables.download_jobs.insert(instrument_id, job);
    }

    /// Attach (or replace) the ingestion job of an instrument.
    pub fn put_ingestion_job(&mut self, instrument_id: InstrumentId, job: IngestionJobStatus) {
        self.tables.ingestion_jobs.insert(instrument_id, job);
    }
}

/// In-memory implementation of InstrumentStore.
///
/// This is useful for testing and development. For production,
/// use a persistent store like PostgresInstrumentStore.
#[derive(Debug, Default)]
pub struct InMemoryInstrumentStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryInstrumentStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction on a snapshot of the committed state.
    pub fn begin(&self) -> InMemoryTx {
        InMemoryTx {
            tables: self.tables.read().clone(),
        }
    }

    /// Publish a transaction's snapshot as the committed state.
    ///
    /// The whole table set is replaced, so the store assumes a single writer:
    /// of two overlapping transactions, the later commit discards the earlier one.
    pub fn commit(&self, tx: InMemoryTx) {
        *self.tables.write() = tx.tables;
    }

    /// Get the number of committed instruments.
    pub fn len(&self) -> usize {
        self.tables.read().instruments.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.tables.read().instruments.is_empty()
    }
}

impl Clone for InMemoryInstrumentStore {
    fn clone(&self) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
        }
    }
}

#[async_trait]
impl InstrumentStore for InMemoryInstrumentStore {
    type Tx = InMemoryTx;

    async fn get_by_id(
        &self,
        tx: &mut InMemoryTx,
        id: InstrumentId,
    ) -> InstrumentResult<Option<Instrument>> {
        Ok(tx.tables.instruments.get(&id).cloned())
    }

    async fn get_by_symbol(
        &self,
        tx: &mut InMemoryTx,
        product_id: ProductId,
        symbol: &str,
    ) -> InstrumentResult<Option<Instrument>> {
        let rows: Vec<Instrument> = tx
            .tables
            .of_product(product_id)
            .filter(|i| i.symbol == symbol)
            .cloned()
            .collect();
        at_most_one(rows, "data_instrument", || {
            format!("data_product_id={} symbol={}", product_id, symbol)
        })
    }

    async fn get_virtual_by_product_id(
        &self,
        tx: &mut InMemoryTx,
        product_id: ProductId,
    ) -> InstrumentResult<Option<Instrument>> {
        let rows: Vec<Instrument> = tx
            .tables
            .of_product(product_id)
            .filter(|i| i.virtual_instrument)
            .cloned()
            .collect();
        at_most_one(rows, "data_instrument", || {
            format!("data_product_id={} virtual_instrument=true", product_id)
        })
    }

    async fn list_by_product_full(
        &self,
        tx: &mut InMemoryTx,
        product_id: ProductId,
        stored_only: bool,
    ) -> InstrumentResult<Vec<InstrumentWithOverlay>> {
        let tables = &tx.tables;
        let mut rows: Vec<InstrumentWithOverlay> = tables
            .of_product(product_id)
            .map(|i| tables.overlay(i))
            .filter(|row| {
                !stored_only
                    || row.data_block_status().is_some()
                    || row.instrument.virtual_instrument
            })
            .collect();
        rows.sort_by(|a, b| by_expiration(&a.instrument, &b.instrument));
        Ok(rows)
    }

    async fn list_by_filter(
        &self,
        tx: &mut InMemoryTx,
        filter: &InstrumentFilter,
    ) -> InstrumentResult<Vec<InstrumentWithProduct>> {
        let tables = &tx.tables;
        let mut rows: Vec<InstrumentWithProduct> = tables
            .instruments
            .values()
            .filter_map(|i| {
                let product = tables.products.get(&i.product_id)?;
                filter.matches(i, product).then(|| InstrumentWithProduct {
                    instrument: i.clone(),
                    product: product.info(),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.instrument.name.cmp(&b.instrument.name));
        Ok(rows)
    }

    async fn list_non_continuous(
        &self,
        tx: &mut InMemoryTx,
        product_id: ProductId,
    ) -> InstrumentResult<Vec<Instrument>> {
        let mut rows: Vec<Instrument> = tx
            .tables
            .of_product(product_id)
            .filter(|i| !i.continuous)
            .cloned()
            .collect();
        rows.sort_by(by_expiration);
        Ok(rows)
    }

    async fn list_non_continuous_full(
        &self,
        tx: &mut InMemoryTx,
        product_id: ProductId,
    ) -> InstrumentResult<Vec<InstrumentWithOverlay>> {
        let tables = &tx.tables;
        let mut rows: Vec<InstrumentWithOverlay> = tables
            .of_product(product_id)
            .filter(|i| !i.continuous)
            .map(|i| tables.overlay(i))
            .collect();
        rows.sort_by(|a, b| by_expiration(&a.instrument, &b.instrument));
        Ok(rows)
    }

    async fn create(
        &self,
        tx: &mut InMemoryTx,
        instrument: &NewInstrument,
    ) -> InstrumentResult<Instrument> {
        let tables = &mut tx.tables;
        tables.check_product_exists(instrument.product_id)?;
        tables.check_symbol_free(instrument.product_id, &instrument.symbol, None)?;

        tables.last_instrument_id += 1;
        let now = Utc::now();
        let stored = Instrument {
            id: InstrumentId::new(tables.last_instrument_id),
            product_id: instrument.product_id,
            data_block_id: instrument.data_block_id,
            symbol: instrument.symbol.clone(),
            name: instrument.name.clone(),
            expiration_date: instrument.expiration_date,
            month: instrument.month.clone(),
            continuous: instrument.continuous,
            virtual_instrument: instrument.virtual_instrument,
            created_at: now,
            updated_at: now,
        };

        tables.instruments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, tx: &mut InMemoryTx, instrument: &Instrument) -> InstrumentResult<()> {
        let tables = &mut tx.tables;
        let created_at = match tables.instruments.get(&instrument.id) {
            Some(existing) => existing.created_at,
            None => return Err(InstrumentError::NotFound(instrument.id.to_string())),
        };
        tables.check_product_exists(instrument.product_id)?;
        tables.check_symbol_free(instrument.product_id, &instrument.symbol, Some(instrument.id))?;

        let mut replaced = instrument.clone();
        replaced.created_at = created_at;
        replaced.updated_at = Utc::now();
        tables.instruments.insert(replaced.id, replaced);
        Ok(())
    }
}
