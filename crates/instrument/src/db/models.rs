//! Database row models for instruments and their joined projections.
//!
//! These structs map directly to PostgreSQL result rows and handle
//! conversion to the domain types in `crate::types`.

use crate::types::{
    DataBlockStatus, DownloadJobStatus, IngestionJobStatus, Instrument, InstrumentId,
    InstrumentWithOverlay, InstrumentWithProduct, ProductId, ProductInfo,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// Database row for an instrument.
/// Maps directly to the data_instrument table.
#[derive(Debug, Clone, FromRow)]
pub struct InstrumentRow {
    pub id: i64,
    pub data_product_id: i64,
    pub data_block_id: Option<i64>,
    pub symbol: String,
    pub name: String,
    pub expiration_date: Option<NaiveDate>,
    pub month: String,
    pub continuous: bool,
    pub virtual_instrument: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstrumentRow {
    /// Convert from database row to domain type.
    pub fn into_domain(self) -> Instrument {
        Instrument {
            id: InstrumentId::new(self.id),
            product_id: ProductId::new(self.data_product_id),
            data_block_id: self.data_block_id,
            symbol: self.symbol,
            name: self.name,
            expiration_date: self.expiration_date,
            month: self.month,
            continuous: self.continuous,
            virtual_instrument: self.virtual_instrument,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Instrument row with the left-joined data_block, download_job and
/// ingestion_job columns. A `*_id` of NULL means the join found no row.
#[derive(Debug, Clone, FromRow)]
pub struct InstrumentOverlayRow {
    #[sqlx(flatten)]
    pub instrument: InstrumentRow,

    pub db_id: Option<i64>,
    pub db_status: Option<String>,
    pub db_data_from: Option<NaiveDate>,
    pub db_data_to: Option<NaiveDate>,
    pub db_progress: Option<f64>,
    pub db_global: Option<bool>,

    pub dj_id: Option<i64>,
    pub dj_status: Option<String>,
    pub dj_priority: Option<i32>,
    pub dj_load_from: Option<NaiveDate>,
    pub dj_load_to: Option<NaiveDate>,
    pub dj_curr_day: Option<i32>,
    pub dj_tot_days: Option<i32>,
    pub dj_error: Option<String>,

    pub ij_id: Option<i64>,
    pub ij_status: Option<String>,
    pub ij_filename: Option<String>,
    pub ij_records: Option<i64>,
    pub ij_bytes: Option<i64>,
    pub ij_timezone: Option<String>,
    pub ij_parser: Option<String>,
    pub ij_error: Option<String>,
}

impl InstrumentOverlayRow {
    pub fn into_domain(self) -> InstrumentWithOverlay {
        let data_block = self.db_id.map(|_| DataBlockStatus {
            status: self.db_status,
            data_from: self.db_data_from,
            data_to: self.db_data_to,
            progress: self.db_progress,
            global: self.db_global,
        });
        let download_job = self.dj_id.map(|_| DownloadJobStatus {
            status: self.dj_status,
            priority: self.dj_priority,
            load_from: self.dj_load_from,
            load_to: self.dj_load_to,
            curr_day: self.dj_curr_day,
            tot_days: self.dj_tot_days,
            error: self.dj_error,
        });
        let ingestion_job = self.ij_id.map(|_| IngestionJobStatus {
            status: self.ij_status,
            filename: self.ij_filename,
            records: self.ij_records,
            bytes: self.ij_bytes,
            timezone: self.ij_timezone,
            parser: self.ij_parser,
            error: self.ij_error,
        });

        InstrumentWithOverlay {
            instrument: self.instrument.into_domain(),
            data_block,
            download_job,
            ingestion_job,
        }
    }
}

/// Instrument row joined with its data_product codes.
#[derive(Debug, Clone, FromRow)]
pub struct InstrumentProductRow {
    #[sqlx(flatten)]
    pub instrument: InstrumentRow,
    pub product_symbol: String,
    pub system_code: String,
    pub connection_code: String,
}

impl InstrumentProductRow {
    pub fn into_domain(self) -> InstrumentWithProduct {
        InstrumentWithProduct {
            instrument: self.instrument.into_domain(),
            product: ProductInfo {
                product_symbol: self.product_symbol,
                system_code: self.system_code,
                connection_code: self.connection_code,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument_row() -> InstrumentRow {
        let now = Utc::now();
        InstrumentRow {
            id: 4,
            data_product_id: 10,
            data_block_id: Some(9),
            symbol: "ESH23".to_string(),
            name: "ESH23".to_string(),
            expiration_date: NaiveDate::from_ymd_opt(2023, 3, 17),
            month: "H23".to_string(),
            continuous: false,
            virtual_instrument: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_overlay_groups_follow_join_keys() {
        let row = InstrumentOverlayRow {
            instrument: instrument_row(),
            db_id: Some(9),
            db_status: None,
            db_data_from: None,
            db_data_to: None,
            db_progress: Some(0.25),
            db_global: Some(true),
            dj_id: None,
            dj_status: None,
            dj_priority: None,
            dj_load_from: None,
            dj_load_to: None,
            dj_curr_day: None,
            dj_tot_days: None,
            dj_error: None,
            ij_id: Some(3),
            ij_status: Some("done".to_string()),
            ij_filename: Some("esh23.csv".to_string()),
            ij_records: Some(10),
            ij_bytes: Some(2048),
            ij_timezone: Some("America/Chicago".to_string()),
            ij_parser: Some("csv-ohlc".to_string()),
            ij_error: None,
        };

        let overlay = row.into_domain();

        assert_eq!(overlay.instrument.id, InstrumentId::new(4));
        // Block exists but the tracker has not set a status yet
        let block = overlay.data_block.as_ref().unwrap();
        assert_eq!(block.status, None);
        assert_eq!(block.progress, Some(0.25));
        assert!(overlay.download_job.is_none());
        assert_eq!(
            overlay.ingestion_job.and_then(|j| j.parser),
            Some("csv-ohlc".to_string())
        );
    }
}
