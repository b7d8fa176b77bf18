//! Rolling set resolution.
//!
//! The rolling set of a product is the sequence of its individual contracts,
//! nearest expiration first, whose month code belongs to the caller's month
//! universe. Continuous and virtual series never belong to it.

use crate::error::InstrumentResult;
use crate::months::MonthUniverse;
use crate::store::InstrumentStore;
use crate::types::{Instrument, InstrumentWithOverlay, ProductId};
use config::{MonthMatch, RollingConfig};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Resolved rolling set, bare or widened with the status overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum RollingSet {
    Bare(Vec<Instrument>),
    WithOverlay(Vec<InstrumentWithOverlay>),
}

impl RollingSet {
    pub fn len(&self) -> usize {
        match self {
            RollingSet::Bare(list) => list.len(),
            RollingSet::WithOverlay(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Instruments in rolling order, regardless of overlay.
    pub fn instruments(&self) -> Vec<&Instrument> {
        match self {
            RollingSet::Bare(list) => list.iter().collect(),
            RollingSet::WithOverlay(list) => list.iter().map(|r| &r.instrument).collect(),
        }
    }
}

/// Rolling set resolver over an [`InstrumentStore`].
pub struct RollingSetResolver<S: InstrumentStore> {
    store: Arc<S>,
    config: RollingConfig,
}

impl<S: InstrumentStore> RollingSetResolver<S> {
    /// Create a new resolver.
    pub fn new(store: Arc<S>, config: RollingConfig) -> Self {
        Self { store, config }
    }

    pub fn month_match(&self) -> MonthMatch {
        self.config.month_match
    }

    /// Read a caller's universe string under the configured policy.
    ///
    /// Only `Exact` rejects malformed tokens; `Substring` keeps the text as given.
    pub fn parse_universe(&self, raw: &str) -> InstrumentResult<MonthUniverse> {
        MonthUniverse::for_policy(raw, self.month_match())
    }

    /// Resolve the rolling set of `product_id` for `months`.
    ///
    /// Without `with_overlay` the store skips the status join entirely.
    pub async fn resolve_rolling_set(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        months: &MonthUniverse,
        with_overlay: bool,
    ) -> InstrumentResult<RollingSet> {
        if with_overlay {
            self.rolling_instruments_with_overlay(tx, product_id, months)
                .await
                .map(RollingSet::WithOverlay)
        } else {
            self.rolling_instruments(tx, product_id, months)
                .await
                .map(RollingSet::Bare)
        }
    }

    /// Rolling instruments without status overlay.
    #[instrument(skip(self, tx, months), fields(universe = months.as_raw()))]
    pub async fn rolling_instruments(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        months: &MonthUniverse,
    ) -> InstrumentResult<Vec<Instrument>> {
        let fetched = self.store.list_non_continuous(tx, product_id).await?;
        Ok(self.retain_rolling(fetched, months))
    }

    /// Rolling instruments widened with data block, download and ingestion status.
    #[instrument(skip(self, tx, months), fields(universe = months.as_raw()))]
    pub async fn rolling_instruments_with_overlay(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        months: &MonthUniverse,
    ) -> InstrumentResult<Vec<InstrumentWithOverlay>> {
        let fetched = self.store.list_non_continuous_full(tx, product_id).await?;
        Ok(self.retain_rolling(fetched, months))
    }

    /// Drop everything outside the month universe, keeping fetch order.
    fn retain_rolling<T: AsRef<Instrument>>(&self, fetched: Vec<T>, months: &MonthUniverse) -> Vec<T> {
        let total = fetched.len();
        let policy = self.month_match();

        // A row must pass both the flag and the month code
        let kept: Vec<T> = fetched
            .into_iter()
            .filter(|row| {
                let instrument = row.as_ref();
                !instrument.continuous
                    && instrument.has_month()
                    && months.contains(&instrument.month, policy)
            })
            .collect();

        debug!(
            fetched = total,
            retained = kept.len(),
            policy = %policy,
            "Filtered rolling candidates"
        );
        kept
    }
}

impl<S: InstrumentStore> Clone for RollingSetResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstrumentError;
    use crate::filter::InstrumentFilter;
    use crate::store::{InMemoryInstrumentStore, InMemoryTx};
    use crate::types::{
        DataBlockStatus, InstrumentId, InstrumentWithProduct, NewInstrument, ProductRecord,
    };
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use mockall::mock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn universe(raw: &str) -> MonthUniverse {
        MonthUniverse::parse(raw).unwrap()
    }

    fn resolver(
        store: &InMemoryInstrumentStore,
        month_match: MonthMatch,
    ) -> RollingSetResolver<InMemoryInstrumentStore> {
        RollingSetResolver::new(Arc::new(store.clone()), RollingConfig { month_match })
    }

    /// Product 10: A (F23), B (G23), C (continuous).
    async fn scenario() -> (InMemoryInstrumentStore, InMemoryTx, Vec<Instrument>) {
        observability::init_test_logging();
        let store = InMemoryInstrumentStore::new();
        let mut tx = store.begin();
        tx.insert_product(ProductRecord {
            id: ProductId::new(10),
            symbol: "ES".to_string(),
            system_code: "CME".to_string(),
            connection_code: "ib-live".to_string(),
            username: "alice".to_string(),
        });

        let pid = ProductId::new(10);
        let block = tx.insert_data_block(DataBlockStatus {
            status: Some("ready".to_string()),
            progress: Some(1.0),
            ..Default::default()
        });
        // Inserted out of expiration order on purpose
        let b = store
            .create(
                &mut tx,
                &NewInstrument::contract(pid, "ESG23", "G23", date(2023, 2, 17)).with_data_block(block),
            )
            .await
            .unwrap();
        let c = store
            .create(&mut tx, &NewInstrument::continuous(pid, "ES-CONT"))
            .await
            .unwrap();
        let a = store
            .create(&mut tx, &NewInstrument::contract(pid, "ESF23", "F23", date(2023, 1, 20)))
            .await
            .unwrap();

        (store, tx, vec![a, b, c])
    }

    #[tokio::test]
    async fn test_rolling_scenario_bare() {
        let (store, mut tx, fixtures) = scenario().await;
        let (a, b) = (&fixtures[0], &fixtures[1]);

        let set = resolver(&store, MonthMatch::Exact)
            .resolve_rolling_set(&mut tx, ProductId::new(10), &universe("F23G23H23"), false)
            .await
            .unwrap();

        assert_eq!(set, RollingSet::Bare(vec![a.clone(), b.clone()]));
    }

    #[tokio::test]
    async fn test_rolling_scenario_with_overlay() {
        let (store, mut tx, fixtures) = scenario().await;
        let (a, b) = (&fixtures[0], &fixtures[1]);

        let set = resolver(&store, MonthMatch::Exact)
            .resolve_rolling_set(&mut tx, ProductId::new(10), &universe("F23G23H23"), true)
            .await
            .unwrap();

        let RollingSet::WithOverlay(rows) = set else {
            panic!("expected overlay rows");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].instrument.id, a.id);
        assert!(rows[0].data_block.is_none());
        assert_eq!(rows[1].instrument.id, b.id);
        assert_eq!(rows[1].data_block_status(), Some("ready"));
    }

    #[tokio::test]
    async fn test_empty_universe_yields_empty_set() {
        let (store, mut tx, _) = scenario().await;
        let resolver = resolver(&store, MonthMatch::Substring);

        for with_overlay in [false, true] {
            let set = resolver
                .resolve_rolling_set(&mut tx, ProductId::new(10), &universe(""), with_overlay)
                .await
                .unwrap();
            assert!(set.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_product_yields_empty_set() {
        let (store, mut tx, _) = scenario().await;

        let set = resolver(&store, MonthMatch::Exact)
            .rolling_instruments(&mut tx, ProductId::new(77), &universe("F23"))
            .await
            .unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_empty_month_excluded_even_if_not_continuous() {
        let (store, mut tx, _) = scenario().await;
        let mut leaked = NewInstrument::continuous(ProductId::new(10), "ES-BACKADJ");
        leaked.continuous = false;
        store.create(&mut tx, &leaked).await.unwrap();

        let set = resolver(&store, MonthMatch::Substring)
            .rolling_instruments(&mut tx, ProductId::new(10), &universe("F23G23H23"))
            .await
            .unwrap();

        assert!(set.iter().all(|i| !i.month.is_empty()));
        assert_eq!(set.len(), 2);
    }

    #[tokio::test]
    async fn test_exact_and_substring_policies_differ_on_partial_token() {
        let (store, mut tx, _) = scenario().await;
        store
            .create(
                &mut tx,
                &NewInstrument::contract(ProductId::new(10), "ESF2", "F2", date(2022, 12, 16)),
            )
            .await
            .unwrap();
        let months = universe("F23G23");

        let exact = resolver(&store, MonthMatch::Exact)
            .rolling_instruments(&mut tx, ProductId::new(10), &months)
            .await
            .unwrap();
        assert_eq!(
            exact.iter().map(|i| i.month.as_str()).collect::<Vec<_>>(),
            vec!["F23", "G23"]
        );

        let substring = resolver(&store, MonthMatch::Substring)
            .rolling_instruments(&mut tx, ProductId::new(10), &months)
            .await
            .unwrap();
        assert_eq!(
            substring.iter().map(|i| i.month.as_str()).collect::<Vec<_>>(),
            vec!["F2", "F23", "G23"]
        );
    }

    #[tokio::test]
    async fn test_substring_policy_accepts_legacy_universe_text() {
        let (store, mut tx, fixtures) = scenario().await;
        let (a, b) = (&fixtures[0], &fixtures[1]);

        let resolver = resolver(&store, MonthMatch::Substring);
        let months = resolver.parse_universe("F23-G23").unwrap();
        let set = resolver
            .resolve_rolling_set(&mut tx, ProductId::new(10), &months, false)
            .await
            .unwrap();
        assert_eq!(set, RollingSet::Bare(vec![a.clone(), b.clone()]));

        let dated = resolver.parse_universe("2023:G23").unwrap();
        let set = resolver
            .rolling_instruments(&mut tx, ProductId::new(10), &dated)
            .await
            .unwrap();
        assert_eq!(set.iter().map(|i| i.id).collect::<Vec<_>>(), vec![b.id]);
    }

    #[tokio::test]
    async fn test_exact_policy_rejects_malformed_universe() {
        let (store, _tx, _) = scenario().await;
        assert_matches!(
            resolver(&store, MonthMatch::Exact).parse_universe("F23-G23"),
            Err(InstrumentError::InvalidMonthUniverse(_))
        );
    }

    #[tokio::test]
    async fn test_same_expiration_keeps_fetch_order() {
        let (store, mut tx, _) = scenario().await;
        let pid = ProductId::new(10);
        let first = store
            .create(&mut tx, &NewInstrument::contract(pid, "ESH23-A", "H23", date(2023, 3, 17)))
            .await
            .unwrap();
        let second = store
            .create(&mut tx, &NewInstrument::contract(pid, "ESH23-B", "H23", date(2023, 3, 17)))
            .await
            .unwrap();

        let set = resolver(&store, MonthMatch::Exact)
            .rolling_instruments(&mut tx, pid, &universe("F23G23H23"))
            .await
            .unwrap();

        let ids: Vec<InstrumentId> = set.iter().map(|i| i.id).collect();
        assert_eq!(&ids[2..], &[first.id, second.id]);
        assert!(set
            .windows(2)
            .all(|w| w[0].expiration_date <= w[1].expiration_date));
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let (store, mut tx, _) = scenario().await;
        let resolver = resolver(&store, MonthMatch::Exact);
        let months = universe("F23G23H23");

        let first = resolver
            .resolve_rolling_set(&mut tx, ProductId::new(10), &months, true)
            .await
            .unwrap();
        let second = resolver
            .resolve_rolling_set(&mut tx, ProductId::new(10), &months, true)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.instruments().len(), 2);
    }

    mock! {
        pub Store {}

        #[async_trait]
        impl InstrumentStore for Store {
            type Tx = ();

            async fn get_by_id(&self, tx: &mut (), id: InstrumentId) -> InstrumentResult<Option<Instrument>>;
            async fn get_by_symbol(&self, tx: &mut (), product_id: ProductId, symbol: &str) -> InstrumentResult<Option<Instrument>>;
            async fn get_virtual_by_product_id(&self, tx: &mut (), product_id: ProductId) -> InstrumentResult<Option<Instrument>>;
            async fn list_by_product_full(&self, tx: &mut (), product_id: ProductId, stored_only: bool) -> InstrumentResult<Vec<InstrumentWithOverlay>>;
            async fn list_by_filter(&self, tx: &mut (), filter: &InstrumentFilter) -> InstrumentResult<Vec<InstrumentWithProduct>>;
            async fn list_non_continuous(&self, tx: &mut (), product_id: ProductId) -> InstrumentResult<Vec<Instrument>>;
            async fn list_non_continuous_full(&self, tx: &mut (), product_id: ProductId) -> InstrumentResult<Vec<InstrumentWithOverlay>>;
            async fn create(&self, tx: &mut (), instrument: &NewInstrument) -> InstrumentResult<Instrument>;
            async fn update(&self, tx: &mut (), instrument: &Instrument) -> InstrumentResult<()>;
        }
    }

    fn bare(id: i64, month: &str, continuous: bool) -> Instrument {
        let now = Utc::now();
        Instrument {
            id: InstrumentId::new(id),
            product_id: ProductId::new(10),
            data_block_id: None,
            symbol: format!("ES{}", month),
            name: format!("ES{}", month),
            expiration_date: None,
            month: month.to_string(),
            continuous,
            virtual_instrument: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_fast_path_skips_overlay_join() {
        let mut store = MockStore::new();
        store
            .expect_list_non_continuous()
            .times(1)
            .returning(|_, _| Ok(vec![bare(1, "F23", false), bare(2, "G23", true)]));
        store.expect_list_non_continuous_full().never();

        let resolver = RollingSetResolver::new(Arc::new(store), RollingConfig::default());
        let set = tokio_test::block_on(resolver.resolve_rolling_set(
            &mut (),
            ProductId::new(10),
            &universe("F23G23"),
            false,
        ))
        .unwrap();

        // Continuous rows leaking from a store are still dropped
        assert_eq!(set.instruments().iter().map(|i| i.id.value()).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_overlay_path_uses_full_listing() {
        let mut store = MockStore::new();
        store.expect_list_non_continuous().never();
        store
            .expect_list_non_continuous_full()
            .times(1)
            .returning(|_, _| {
                Ok(vec![InstrumentWithOverlay {
                    instrument: bare(3, "H23", false),
                    data_block: None,
                    download_job: None,
                    ingestion_job: None,
                }])
            });

        let resolver = RollingSetResolver::new(Arc::new(store), RollingConfig::default());
        let set = tokio_test::block_on(resolver.resolve_rolling_set(
            &mut (),
            ProductId::new(10),
            &universe("H23"),
            true,
        ))
        .unwrap();

        assert_matches!(set, RollingSet::WithOverlay(rows) if rows.len() == 1);
    }

    #[test]
    fn test_store_failure_propagates_unchanged() {
        let mut store = MockStore::new();
        store
            .expect_list_non_continuous()
            .returning(|_, _| Err(InstrumentError::Storage("connection reset".to_string())));

        let resolver = RollingSetResolver::new(Arc::new(store), RollingConfig::default());
        let result = tokio_test::block_on(resolver.rolling_instruments(
            &mut (),
            ProductId::new(10),
            &universe("F23"),
        ));

        assert_eq!(
            result,
            Err(InstrumentError::Storage("connection reset".to_string()))
        );
    }
}
