//! Typed equality criteria for filtered instrument listings.
//!
//! Only fields in [`FilterField`] can be filtered on. Ownership lives on the
//! product, so a `username` criterion resolves to `data_product.username`.

use crate::error::{InstrumentError, InstrumentResult};
use crate::types::{Instrument, ProductId, ProductRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Filterable field allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterField {
    Id,
    ProductId,
    Symbol,
    Name,
    Month,
    Continuous,
    VirtualInstrument,
    Username,
    SystemCode,
    ConnectionCode,
}

/// Value type a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Text,
    Flag,
}

impl FilterField {
    pub const ALL: [FilterField; 10] = [
        FilterField::Id,
        FilterField::ProductId,
        FilterField::Symbol,
        FilterField::Name,
        FilterField::Month,
        FilterField::Continuous,
        FilterField::VirtualInstrument,
        FilterField::Username,
        FilterField::SystemCode,
        FilterField::ConnectionCode,
    ];

    /// Criteria key as sent by callers.
    pub fn key(&self) -> &'static str {
        match self {
            FilterField::Id => "id",
            FilterField::ProductId => "data_product_id",
            FilterField::Symbol => "symbol",
            FilterField::Name => "name",
            FilterField::Month => "month",
            FilterField::Continuous => "continuous",
            FilterField::VirtualInstrument => "virtual_instrument",
            FilterField::Username => "username",
            FilterField::SystemCode => "system_code",
            FilterField::ConnectionCode => "connection_code",
        }
    }

    /// Qualified column: `di` is `data_instrument`, `dp` is `data_product`.
    pub fn column(&self) -> &'static str {
        match self {
            FilterField::Id => "di.id",
            FilterField::ProductId => "di.data_product_id",
            FilterField::Symbol => "di.symbol",
            FilterField::Name => "di.name",
            FilterField::Month => "di.month",
            FilterField::Continuous => "di.continuous",
            FilterField::VirtualInstrument => "di.virtual_instrument",
            FilterField::Username => "dp.username",
            FilterField::SystemCode => "dp.system_code",
            FilterField::ConnectionCode => "dp.connection_code",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            FilterField::Id | FilterField::ProductId => ValueKind::Integer,
            FilterField::Continuous | FilterField::VirtualInstrument => ValueKind::Flag,
            _ => ValueKind::Text,
        }
    }

    /// Whether the field lives on the product rather than the instrument.
    pub fn is_product_field(&self) -> bool {
        self.column().starts_with("dp.")
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            // "product_id" is accepted as an alias of the column name
            "product_id" => Some(FilterField::ProductId),
            _ => Self::ALL.iter().copied().find(|f| f.key() == key),
        }
    }

    /// Read this field's value from an instrument joined with its product.
    pub fn read(&self, instrument: &Instrument, product: &ProductRecord) -> FilterValue {
        match self {
            FilterField::Id => FilterValue::Integer(instrument.id.value()),
            FilterField::ProductId => FilterValue::Integer(instrument.product_id.value()),
            FilterField::Symbol => FilterValue::Text(instrument.symbol.clone()),
            FilterField::Name => FilterValue::Text(instrument.name.clone()),
            FilterField::Month => FilterValue::Text(instrument.month.clone()),
            FilterField::Continuous => FilterValue::Flag(instrument.continuous),
            FilterField::VirtualInstrument => FilterValue::Flag(instrument.virtual_instrument),
            FilterField::Username => FilterValue::Text(product.username.clone()),
            FilterField::SystemCode => FilterValue::Text(product.system_code.clone()),
            FilterField::ConnectionCode => FilterValue::Text(product.connection_code.clone()),
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Equality operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Integer(i64),
    Text(String),
    Flag(bool),
}

impl FilterValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FilterValue::Integer(_) => ValueKind::Integer,
            FilterValue::Text(_) => ValueKind::Text,
            FilterValue::Flag(_) => ValueKind::Flag,
        }
    }

    /// Convert a JSON criterion into the kind `field` expects.
    fn from_json(field: FilterField, value: &Value) -> InstrumentResult<Self> {
        let converted = match (field.kind(), value) {
            (ValueKind::Integer, Value::Number(n)) => n.as_i64().map(FilterValue::Integer),
            (ValueKind::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().ok().map(FilterValue::Integer)
            }
            (ValueKind::Text, Value::String(s)) => Some(FilterValue::Text(s.clone())),
            (ValueKind::Flag, Value::Bool(b)) => Some(FilterValue::Flag(*b)),
            // Legacy callers send 0/1 for flags
            (ValueKind::Flag, Value::Number(n)) => match n.as_i64() {
                Some(0) => Some(FilterValue::Flag(false)),
                Some(1) => Some(FilterValue::Flag(true)),
                _ => None,
            },
            _ => None,
        };

        converted.ok_or_else(|| {
            InstrumentError::InvalidFilter(format!(
                "value {} is not a valid {:?} for '{}'",
                value,
                field.kind(),
                field
            ))
        })
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Integer(v)
    }
}

impl From<ProductId> for FilterValue {
    fn from(v: ProductId) -> Self {
        FilterValue::Integer(v.value())
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Flag(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

/// One `column = value` constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: FilterField,
    pub value: FilterValue,
}

/// Conjunction of equality constraints, at most one per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentFilter {
    predicates: Vec<Predicate>,
}

impl InstrumentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain `field` to equal `value`, replacing any earlier constraint on it.
    pub fn try_with(
        self,
        field: FilterField,
        value: impl Into<FilterValue>,
    ) -> InstrumentResult<Self> {
        let value = value.into();
        if value.kind() != field.kind() {
            return Err(InstrumentError::InvalidFilter(format!(
                "'{}' expects {:?}, got {:?}",
                field,
                field.kind(),
                value.kind()
            )));
        }
        Ok(self.set(field, value))
    }

    fn set(mut self, field: FilterField, value: FilterValue) -> Self {
        match self.predicates.iter_mut().find(|p| p.field == field) {
            Some(existing) => existing.value = value,
            None => self.predicates.push(Predicate { field, value }),
        }
        self
    }

    pub fn with_product_id(self, product_id: ProductId) -> Self {
        self.set(FilterField::ProductId, product_id.into())
    }

    pub fn with_username(self, username: impl Into<String>) -> Self {
        self.set(FilterField::Username, FilterValue::Text(username.into()))
    }

    pub fn with_symbol(self, symbol: impl Into<String>) -> Self {
        self.set(FilterField::Symbol, FilterValue::Text(symbol.into()))
    }

    pub fn with_month(self, month: impl Into<String>) -> Self {
        self.set(FilterField::Month, FilterValue::Text(month.into()))
    }

    pub fn with_continuous(self, continuous: bool) -> Self {
        self.set(FilterField::Continuous, FilterValue::Flag(continuous))
    }

    pub fn with_virtual_instrument(self, virtual_instrument: bool) -> Self {
        self.set(FilterField::VirtualInstrument, FilterValue::Flag(virtual_instrument))
    }

    /// Parse an open criteria map, rejecting keys outside the allow-list.
    pub fn from_criteria(criteria: &HashMap<String, Value>) -> InstrumentResult<Self> {
        let mut keys: Vec<&String> = criteria.keys().collect();
        keys.sort();

        let mut filter = Self::new();
        for key in keys {
            let field = FilterField::from_key(key).ok_or_else(|| {
                InstrumentError::InvalidFilter(format!("'{}' is not a filterable field", key))
            })?;
            let value = FilterValue::from_json(field, &criteria[key])?;
            filter = filter.try_with(field, value)?;
        }
        Ok(filter)
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn get(&self, field: FilterField) -> Option<&FilterValue> {
        self.predicates
            .iter()
            .find(|p| p.field == field)
            .map(|p| &p.value)
    }

    /// Evaluate against an instrument joined with its product.
    pub fn matches(&self, instrument: &Instrument, product: &ProductRecord) -> bool {
        self.predicates
            .iter()
            .all(|p| p.field.read(instrument, product) == p.value)
    }
}
