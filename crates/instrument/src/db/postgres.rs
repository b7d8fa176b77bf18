//! PostgreSQL implementation of the `InstrumentStore` trait.
//!
//! The store is stateless: every call runs on the caller's `PgConnection`,
//! which may be a pooled connection or an open `Transaction`. Values are
//! always bound as parameters.

use crate::db::models::{InstrumentOverlayRow, InstrumentProductRow, InstrumentRow};
use crate::error::{InstrumentError, InstrumentResult};
use crate::filter::{FilterValue, InstrumentFilter};
use crate::store::{at_most_one, InstrumentStore};
use crate::types::{
    Instrument, InstrumentId, InstrumentWithOverlay, InstrumentWithProduct, NewInstrument,
    ProductId,
};
use async_trait::async_trait;
use config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, info, instrument};

macro_rules! instrument_columns {
    () => {
        "di.id, di.data_product_id, di.data_block_id, di.symbol, di.name, \
         di.expiration_date, di.month, di.continuous, di.virtual_instrument, \
         di.created_at, di.updated_at"
    };
}

const SELECT_INSTRUMENT: &str = concat!(
    "SELECT ",
    instrument_columns!(),
    " FROM data_instrument di"
);

const SELECT_OVERLAY: &str = concat!(
    "SELECT ",
    instrument_columns!(),
    ", db.id AS db_id, db.status AS db_status, db.data_from AS db_data_from, \
     db.data_to AS db_data_to, db.progress AS db_progress, db.global AS db_global, \
     dj.id AS dj_id, dj.status AS dj_status, dj.priority AS dj_priority, \
     dj.load_from AS dj_load_from, dj.load_to AS dj_load_to, dj.curr_day AS dj_curr_day, \
     dj.tot_days AS dj_tot_days, dj.error AS dj_error, \
     ij.id AS ij_id, ij.status AS ij_status, ij.filename AS ij_filename, \
     ij.records AS ij_records, ij.bytes AS ij_bytes, ij.timezone AS ij_timezone, \
     ij.parser AS ij_parser, ij.error AS ij_error \
     FROM data_instrument di \
     LEFT JOIN data_block db ON db.id = di.data_block_id \
     LEFT JOIN download_job dj ON dj.data_instrument_id = di.id \
     LEFT JOIN ingestion_job ij ON ij.data_instrument_id = di.id"
);

const SELECT_WITH_PRODUCT: &str = concat!(
    "SELECT ",
    instrument_columns!(),
    ", dp.symbol AS product_symbol, dp.system_code, dp.connection_code \
     FROM data_instrument di \
     JOIN data_product dp ON dp.id = di.data_product_id"
);

const BY_EXPIRATION: &str = " ORDER BY di.expiration_date ASC, di.id ASC";

/// Open a connection pool from configuration.
pub async fn connect(config: &DatabaseConfig) -> InstrumentResult<PgPool> {
    let url = config
        .connection_url()
        .map_err(|e| InstrumentError::Config(format!("Invalid database settings: {}", e)))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .connect(&url)
        .await
        .map_err(|e| InstrumentError::Storage(format!("Failed to connect to database: {}", e)))?;

    info!(
        "Connected to PostgreSQL at {}:{}/{}",
        config.host, config.port, config.database
    );
    Ok(pool)
}

/// Run the migration SQL to create tables.
pub async fn run_migrations(pool: &PgPool) -> InstrumentResult<()> {
    let migration_sql = include_str!("../../../../migrations/001_create_data_instruments.sql");
    sqlx::raw_sql(migration_sql)
        .execute(pool)
        .await
        .map_err(|e| InstrumentError::Storage(format!("Migration failed: {}", e)))?;
    info!("Database migrations completed successfully");
    Ok(())
}

/// Build the filtered listing query. Columns come from the field allow-list.
pub(crate) fn filter_query(filter: &InstrumentFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_WITH_PRODUCT);
    builder.push(" WHERE TRUE");

    for predicate in filter.predicates() {
        builder.push(" AND ");
        builder.push(predicate.field.column());
        builder.push(" = ");
        match &predicate.value {
            FilterValue::Integer(v) => builder.push_bind(*v),
            FilterValue::Text(v) => builder.push_bind(v.clone()),
            FilterValue::Flag(v) => builder.push_bind(*v),
        };
    }

    builder.push(" ORDER BY di.name ASC, di.id ASC");
    builder
}

/// PostgreSQL-backed instrument store over `data_instrument`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresInstrumentStore;

impl PostgresInstrumentStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InstrumentStore for PostgresInstrumentStore {
    type Tx = PgConnection;

    #[instrument(skip(self, tx))]
    async fn get_by_id(
        &self,
        tx: &mut PgConnection,
        id: InstrumentId,
    ) -> InstrumentResult<Option<Instrument>> {
        let query = format!("{} WHERE di.id = $1", SELECT_INSTRUMENT);
        let rows = sqlx::query_as::<_, InstrumentRow>(&query)
            .bind(id.value())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| InstrumentError::Storage(format!("Failed to get instrument: {}", e)))?;

        let row = at_most_one(rows, "data_instrument", || format!("id={}", id))?;
        Ok(row.map(InstrumentRow::into_domain))
    }

    #[instrument(skip(self, tx))]
    async fn get_by_symbol(
        &self,
        tx: &mut PgConnection,
        product_id: ProductId,
        symbol: &str,
    ) -> InstrumentResult<Option<Instrument>> {
        let query = format!(
            "{} WHERE di.data_product_id = $1 AND di.symbol = $2",
            SELECT_INSTRUMENT
        );
        let rows = sqlx::query_as::<_, InstrumentRow>(&query)
            .bind(product_id.value())
            .bind(symbol)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                InstrumentError::Storage(format!("Failed to get instrument by symbol: {}", e))
            })?;

        let row = at_most_one(rows, "data_instrument", || {
            format!("data_product_id={} symbol={}", product_id, symbol)
        })?;
        Ok(row.map(InstrumentRow::into_domain))
    }

    #[instrument(skip(self, tx))]
    async fn get_virtual_by_product_id(
        &self,
        tx: &mut PgConnection,
        product_id: ProductId,
    ) -> InstrumentResult<Option<Instrument>> {
        let query = format!(
            "{} WHERE di.data_product_id = $1 AND di.virtual_instrument = TRUE",
            SELECT_INSTRUMENT
        );
        let rows = sqlx::query_as::<_, InstrumentRow>(&query)
            .bind(product_id.value())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                InstrumentError::Storage(format!("Failed to get virtual instrument: {}", e))
            })?;

        let row = at_most_one(rows, "data_instrument", || {
            format!("data_product_id={} virtual_instrument=true", product_id)
        })?;
        Ok(row.map(InstrumentRow::into_domain))
    }

    #[instrument(skip(self, tx))]
    async fn list_by_product_full(
        &self,
        tx: &mut PgConnection,
        product_id: ProductId,
        stored_only: bool,
    ) -> InstrumentResult<Vec<InstrumentWithOverlay>> {
        let query = format!(
            "{} WHERE di.data_product_id = $1 \
             AND (NOT $2 OR db.status IS NOT NULL OR di.virtual_instrument){}",
            SELECT_OVERLAY, BY_EXPIRATION
        );
        let rows = sqlx::query_as::<_, InstrumentOverlayRow>(&query)
            .bind(product_id.value())
            .bind(stored_only)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                InstrumentError::Storage(format!("Failed to list product instruments: {}", e))
            })?;

        debug!("Listed {} instruments for product {}", rows.len(), product_id);
        Ok(rows.into_iter().map(InstrumentOverlayRow::into_domain).collect())
    }

    #[instrument(skip(self, tx))]
    async fn list_by_filter(
        &self,
        tx: &mut PgConnection,
        filter: &InstrumentFilter,
    ) -> InstrumentResult<Vec<InstrumentWithProduct>> {
        let mut builder = filter_query(filter);
        let rows = builder
            .build_query_as::<InstrumentProductRow>()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                InstrumentError::Storage(format!("Failed to list filtered instruments: {}", e))
            })?;

        Ok(rows.into_iter().map(InstrumentProductRow::into_domain).collect())
    }

    #[instrument(skip(self, tx))]
    async fn list_non_continuous(
        &self,
        tx: &mut PgConnection,
        product_id: ProductId,
    ) -> InstrumentResult<Vec<Instrument>> {
        let query = format!(
            "{} WHERE di.data_product_id = $1 AND di.continuous = FALSE{}",
            SELECT_INSTRUMENT, BY_EXPIRATION
        );
        let rows = sqlx::query_as::<_, InstrumentRow>(&query)
            .bind(product_id.value())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                InstrumentError::Storage(format!("Failed to list rolling candidates: {}", e))
            })?;

        Ok(rows.into_iter().map(InstrumentRow::into_domain).collect())
    }

    #[instrument(skip(self, tx))]
    async fn list_non_continuous_full(
        &self,
        tx: &mut PgConnection,
        product_id: ProductId,
    ) -> InstrumentResult<Vec<InstrumentWithOverlay>> {
        let query = format!(
            "{} WHERE di.data_product_id = $1 AND di.continuous = FALSE{}",
            SELECT_OVERLAY, BY_EXPIRATION
        );
        let rows = sqlx::query_as::<_, InstrumentOverlayRow>(&query)
            .bind(product_id.value())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                InstrumentError::Storage(format!("Failed to list rolling candidates: {}", e))
            })?;

        Ok(rows.into_iter().map(InstrumentOverlayRow::into_domain).collect())
    }

    #[instrument(skip(self, tx, instrument), fields(symbol = %instrument.symbol))]
    async fn create(
        &self,
        tx: &mut PgConnection,
        instrument: &NewInstrument,
    ) -> InstrumentResult<Instrument> {
        let query = concat!(
            "INSERT INTO data_instrument AS di (\
                data_product_id, data_block_id, symbol, name, expiration_date, \
                month, continuous, virtual_instrument\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING ",
            instrument_columns!()
        );

        let row = sqlx::query_as::<_, InstrumentRow>(query)
            .bind(instrument.product_id.value())
            .bind(instrument.data_block_id)
            .bind(&instrument.symbol)
            .bind(&instrument.name)
            .bind(instrument.expiration_date)
            .bind(&instrument.month)
            .bind(instrument.continuous)
            .bind(instrument.virtual_instrument)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| InstrumentError::Storage(format!("Failed to create instrument: {}", e)))?;

        debug!("Created instrument {} ({})", row.id, row.symbol);
        Ok(row.into_domain())
    }

    #[instrument(skip(self, tx, instrument), fields(id = %instrument.id))]
    async fn update(&self, tx: &mut PgConnection, instrument: &Instrument) -> InstrumentResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE data_instrument SET
                data_product_id = $2,
                data_block_id = $3,
                symbol = $4,
                name = $5,
                expiration_date = $6,
                month = $7,
                continuous = $8,
                virtual_instrument = $9,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(instrument.id.value())
        .bind(instrument.product_id.value())
        .bind(instrument.data_block_id)
        .bind(&instrument.symbol)
        .bind(&instrument.name)
        .bind(instrument.expiration_date)
        .bind(&instrument.month)
        .bind(instrument.continuous)
        .bind(instrument.virtual_instrument)
        .execute(&mut *tx)
        .await
        .map_err(|e| InstrumentError::Storage(format!("Failed to update instrument: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(InstrumentError::NotFound(instrument.id.to_string()));
        }

        Ok(())
    }
}
