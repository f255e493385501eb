use chrono::NaiveDate;
use dwh_postgres::types::TableName;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::bail;
use crate::error::{DwhResult, ErrorKind};
use crate::store::warehouse::{DateStore, DimensionStore};
use crate::types::{CompanyKey, DateKey};

/// Resolves natural keys of one batch to surrogate keys.
///
/// Keys are fetched with one lookup per dimension when the resolver is loaded; every
/// later lookup is answered from memory. Company keys only come from current versions.
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    company_keys: HashMap<String, CompanyKey>,
    date_keys: HashMap<NaiveDate, DateKey>,
}

impl KeyResolver {
    pub fn new(
        company_keys: HashMap<String, CompanyKey>,
        date_keys: HashMap<NaiveDate, DateKey>,
    ) -> Self {
        Self {
            company_keys,
            date_keys,
        }
    }

    /// Loads the keys of `symbols` and `dates` in two set-based lookups.
    pub async fn load<W>(
        warehouse: &W,
        dimension: &TableName,
        date_dimension: &TableName,
        symbols: BTreeSet<String>,
        dates: BTreeSet<NaiveDate>,
    ) -> DwhResult<Self>
    where
        W: DimensionStore + DateStore,
    {
        let symbols = symbols.into_iter().collect::<Vec<_>>();
        let dates = dates.into_iter().collect::<Vec<_>>();

        let company_keys = if symbols.is_empty() {
            HashMap::new()
        } else {
            warehouse.company_keys(dimension, &symbols).await?
        };
        let date_keys = if dates.is_empty() {
            HashMap::new()
        } else {
            warehouse.date_keys(date_dimension, &dates).await?
        };
        debug!(
            symbols = symbols.len(),
            resolved_symbols = company_keys.len(),
            dates = dates.len(),
            resolved_dates = date_keys.len(),
            "loaded surrogate keys"
        );

        Ok(Self::new(company_keys, date_keys))
    }

    /// Returns the key of the current version of `symbol`.
    pub fn resolve_company_key(&self, symbol: &str) -> Option<CompanyKey> {
        self.company_keys.get(symbol).copied()
    }

    pub fn resolve_date_key(&self, date: NaiveDate) -> Option<DateKey> {
        self.date_keys.get(&date).copied()
    }

    /// Resolves `date`, failing with [`ErrorKind::MissingDateKey`] when the date dimension
    /// has no row for it.
    pub fn require_date_key(&self, date: NaiveDate, table: &str) -> DwhResult<DateKey> {
        match self.resolve_date_key(date) {
            Some(key) => Ok(key),
            None => bail!(
                ErrorKind::MissingDateKey,
                "Date missing from the date dimension",
                format!("{date} referenced by `{table}`; seed the date dimension to cover it")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{COMPANY_DIMENSION, WarehouseLayout};
    use crate::store::warehouse::memory::MemoryWarehouse;
    use crate::store::warehouse::{DimensionChanges, WarehouseAdmin};
    use crate::types::{Cell, TableRow, TableRows};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn missing_dates_are_loud() {
        let resolver = KeyResolver::new(
            HashMap::new(),
            HashMap::from([(date(2024, 3, 29), DateKey(20240329))]),
        );

        assert_eq!(
            resolver.require_date_key(date(2024, 3, 29), "fact_history_stock").unwrap(),
            DateKey(20240329)
        );
        let err = resolver
            .require_date_key(date(2024, 3, 30), "fact_history_stock")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingDateKey);
        assert_eq!(resolver.resolve_company_key("AAPL"), None);
    }

    #[tokio::test]
    async fn loads_only_current_company_versions() {
        let warehouse = MemoryWarehouse::new();
        let layout = WarehouseLayout::default();
        warehouse.prepare(&layout).await.unwrap();
        let dimension = layout.dimension_table(&COMPANY_DIMENSION);
        let date_dimension = layout.date_dimension();
        warehouse
            .seed_dates(&date_dimension, date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();

        let schema = {
            let mut schema = COMPANY_DIMENSION.table_schema();
            schema.columns.remove(0);
            schema
        };
        let version = |symbol: &str| {
            let mut values = vec![Cell::Null; schema.len()];
            values[schema.index_of("symbol").unwrap()] = Cell::from(symbol);
            values[schema.index_of("valid_from_date").unwrap()] = Cell::from(date(2024, 1, 2));
            values[schema.index_of("is_current").unwrap()] = Cell::from(true);
            values[schema.index_of("dw_load_timestamp").unwrap()] =
                Cell::from(date(2024, 1, 2).and_hms_opt(0, 0, 0).unwrap());
            TableRow::new(values)
        };
        warehouse
            .apply_versions(
                &dimension,
                DimensionChanges {
                    expirations: vec![],
                    versions: TableRows::new(schema.clone(), vec![version("AAPL")]),
                },
            )
            .await
            .unwrap();

        let resolver = KeyResolver::load(
            &warehouse,
            &dimension,
            &date_dimension,
            BTreeSet::from(["AAPL".to_string(), "MSFT".to_string()]),
            BTreeSet::from([date(2024, 1, 15), date(2024, 2, 1)]),
        )
        .await
        .unwrap();

        assert_eq!(resolver.resolve_company_key("AAPL"), Some(CompanyKey(1)));
        assert_eq!(resolver.resolve_company_key("MSFT"), None);
        assert_eq!(resolver.resolve_date_key(date(2024, 1, 15)), Some(DateKey(20240115)));
        assert_eq!(resolver.resolve_date_key(date(2024, 2, 1)), None);
    }
}
