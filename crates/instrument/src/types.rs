//! Core domain types for data instruments.
//!
//! - `Instrument`: one tradable contract, or a synthetic continuous/virtual series
//! - `InstrumentWithOverlay`: an instrument plus the acquisition status of its
//!   data block, download job and ingestion job
//! - `InstrumentWithProduct`: an instrument plus its owning product's codes

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(i64);

impl InstrumentId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for InstrumentId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of the data product that owns an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProductId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A tradable contract or a synthetic aggregate series of a data product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub product_id: ProductId,
    /// Data block holding this instrument's stored range, if one was allocated.
    pub data_block_id: Option<i64>,
    /// Exchange ticker, unique within the product.
    pub symbol: String,
    pub name: String,
    /// Required for individual contracts; `None` for continuous series.
    pub expiration_date: Option<NaiveDate>,
    /// Contract month code (e.g. "F23"); empty for continuous/virtual instruments.
    pub month: String,
    /// Synthetic back-adjusted series, never part of a rolling set.
    pub continuous: bool,
    /// Product-level placeholder series.
    pub virtual_instrument: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instrument {
    /// Whether this record carries a contract month code.
    pub fn has_month(&self) -> bool {
        !self.month.is_empty()
    }
}

impl AsRef<Instrument> for Instrument {
    fn as_ref(&self) -> &Instrument {
        self
    }
}

/// Instrument fields supplied by the provisioning process on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInstrument {
    pub product_id: ProductId,
    pub data_block_id: Option<i64>,
    pub symbol: String,
    pub name: String,
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub continuous: bool,
    #[serde(default)]
    pub virtual_instrument: bool,
}

impl NewInstrument {
    /// An individual contract with a month code and expiration.
    pub fn contract(
        product_id: ProductId,
        symbol: impl Into<String>,
        month: impl Into<String>,
        expiration_date: NaiveDate,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            product_id,
            data_block_id: None,
            name: symbol.clone(),
            symbol,
            expiration_date: Some(expiration_date),
            month: month.into(),
            continuous: false,
            virtual_instrument: false,
        }
    }

    /// A continuous back-adjusted series without month or expiration.
    pub fn continuous(product_id: ProductId, symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self {
            product_id,
            data_block_id: None,
            name: symbol.clone(),
            symbol,
            expiration_date: None,
            month: String::new(),
            continuous: true,
            virtual_instrument: false,
        }
    }

    /// The product-level virtual placeholder series.
    pub fn virtual_series(product_id: ProductId, symbol: impl Into<String>) -> Self {
        Self {
            virtual_instrument: true,
            ..Self::continuous(product_id, symbol)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_data_block(mut self, data_block_id: i64) -> Self {
        self.data_block_id = Some(data_block_id);
        self
    }
}

/// Stored-range status of the instrument's data block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataBlockStatus {
    pub status: Option<String>,
    pub data_from: Option<NaiveDate>,
    pub data_to: Option<NaiveDate>,
    /// Completion fraction.
    pub progress: Option<f64>,
    /// Block is shared across users instead of owned by one.
    pub global: Option<bool>,
}

/// Historical download job status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadJobStatus {
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub load_from: Option<NaiveDate>,
    pub load_to: Option<NaiveDate>,
    pub curr_day: Option<i32>,
    pub tot_days: Option<i32>,
    pub error: Option<String>,
}

/// Live or one-shot ingestion job status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestionJobStatus {
    pub status: Option<String>,
    pub filename: Option<String>,
    pub records: Option<i64>,
    pub bytes: Option<i64>,
    pub timezone: Option<String>,
    pub parser: Option<String>,
    pub error: Option<String>,
}

/// Instrument widened with its read-only status overlay.
///
/// Each group is `None` when no subordinate record exists yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentWithOverlay {
    #[serde(flatten)]
    pub instrument: Instrument,
    pub data_block: Option<DataBlockStatus>,
    pub download_job: Option<DownloadJobStatus>,
    pub ingestion_job: Option<IngestionJobStatus>,
}

impl InstrumentWithOverlay {
    /// Status of the data block, when one exists and has a status set.
    pub fn data_block_status(&self) -> Option<&str> {
        self.data_block.as_ref()?.status.as_deref()
    }
}

impl AsRef<Instrument> for InstrumentWithOverlay {
    fn as_ref(&self) -> &Instrument {
        &self.instrument
    }
}

/// Fields of the owning data product projected into filtered listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_symbol: String,
    pub system_code: String,
    pub connection_code: String,
}

/// Data product fields this crate reads. Products are owned elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub symbol: String,
    pub system_code: String,
    pub connection_code: String,
    /// Owner of the product and, through it, of every instrument it holds.
    pub username: String,
}

impl ProductRecord {
    pub fn info(&self) -> ProductInfo {
        ProductInfo {
            product_symbol: self.symbol.clone(),
            system_code: self.system_code.clone(),
            connection_code: self.connection_code.clone(),
        }
    }
}

/// Instrument widened with its product's codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentWithProduct {
    #[serde(flatten)]
    pub instrument: Instrument,
    #[serde(flatten)]
    pub product: ProductInfo,
}

impl AsRef<Instrument> for InstrumentWithProduct {
    fn as_ref(&self) -> &Instrument {
        &self.instrument
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_instrument_constructors() {
        let exp = NaiveDate::from_ymd_opt(2023, 1, 20).unwrap();
        let contract = NewInstrument::contract(ProductId::new(10), "ESF23", "F23", exp);
        assert_eq!(contract.name, "ESF23");
        assert_eq!(contract.month, "F23");
        assert!(!contract.continuous);

        let cont = NewInstrument::continuous(ProductId::new(10), "ES-CONT");
        assert!(cont.continuous);
        assert!(cont.month.is_empty());
        assert!(cont.expiration_date.is_none());

        let virt = NewInstrument::virtual_series(ProductId::new(10), "ES");
        assert!(virt.virtual_instrument);
        assert!(virt.continuous);
    }

    #[test]
    fn test_overlay_serializes_flat_instrument() {
        let now = Utc::now();
        let row = InstrumentWithOverlay {
            instrument: Instrument {
                id: InstrumentId::new(7),
                product_id: ProductId::new(10),
                data_block_id: None,
                symbol: "ESF23".to_string(),
                name: "ESF23".to_string(),
                expiration_date: None,
                month: "F23".to_string(),
                continuous: false,
                virtual_instrument: false,
                created_at: now,
                updated_at: now,
            },
            data_block: None,
            download_job: None,
            ingestion_job: None,
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["month"], "F23");
        assert!(json["data_block"].is_null());
        assert_eq!(row.data_block_status(), None);
    }
}
