//! JSON catalog snapshots.
//!
//! A snapshot carries everything the engine needs to price: products,
//! formulas, exchange rates, client overrides and tier matrices. Loading
//! validates all of it up front, so a snapshot that loads can be priced
//! without configuration surprises.
//!
//! ```json
//! {
//!   "products": [
//!     { "id": "RESIN", "calculation_type": "LIQUID", "reference_value": "0",
//!       "margin": "0.2", "cost": { "mode": "base_cost", "reference_cost": "2.00" } }
//!   ],
//!   "formulas": [
//!     { "product_id": "PAINT", "items": [ { "ingredient": "RESIN", "percentage": "100" } ] }
//!   ],
//!   "exchange_rates": { "OFFICIAL": "1000" },
//!   "overrides": [
//!     { "client_id": "ACME", "product_id": "PAINT",
//!       "rule": { "mode": "fixed_unit_price", "value": "1800" } }
//!   ],
//!   "matrices": [ { "calculation_type": "LIQUID", "file": "liquid.csv" } ]
//! }
//! ```

use crate::catalog::client_pricing::InMemoryClientPricing;
use crate::catalog::product_catalog::InMemoryCatalog;
use crate::core::client::ClientPriceOverride;
use crate::core::error::{CatalogError, FormulaError, MatrixError, OverrideError};
use crate::core::exchange_rate::{ExchangeRateTable, RateError};
use crate::core::formula::{Formula, FormulaInput};
use crate::core::product::{CalculationType, Product};
use crate::pricing::calculator::PricingContext;
use crate::pricing::tier_matrix::TierMatrixSet;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("matrix {0} has neither a file nor an inline table")]
    MissingMatrixSource(CalculationType),

    #[error("matrix {0} is listed more than once")]
    DuplicateMatrix(CalculationType),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    Rate(#[from] RateError),

    #[error(transparent)]
    Override(#[from] OverrideError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

/// Where a tier matrix's tabular text comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixSource {
    pub calculation_type: CalculationType,
    /// Path relative to the snapshot file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Inline table, used when `file` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

impl MatrixSource {
    pub fn inline(calculation_type: impl Into<CalculationType>, table: impl Into<String>) -> Self {
        Self {
            calculation_type: calculation_type.into(),
            file: None,
            table: Some(table.into()),
        }
    }

    fn read(&self, base_dir: &Path) -> Result<String, SnapshotError> {
        match (&self.file, &self.table) {
            (Some(file), _) => {
                let path = base_dir.join(file);
                fs::read_to_string(&path).map_err(|source| SnapshotError::Io { path, source })
            }
            (None, Some(table)) => Ok(table.clone()),
            (None, None) => Err(SnapshotError::MissingMatrixSource(
                self.calculation_type.clone(),
            )),
        }
    }
}

/// Unvalidated snapshot as it appears on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub formulas: Vec<FormulaInput>,
    #[serde(default)]
    pub exchange_rates: ExchangeRateTable,
    #[serde(default)]
    pub overrides: Vec<ClientPriceOverride>,
    #[serde(default)]
    pub matrices: Vec<MatrixSource>,
}

impl CatalogSnapshot {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate and load everything. Matrix files resolve against
    /// `base_dir`.
    pub fn build(self, base_dir: &Path) -> Result<LoadedCatalog, SnapshotError> {
        let mut catalog = InMemoryCatalog::new();
        for product in self.products {
            catalog.insert_product(product)?;
        }
        for input in self.formulas {
            catalog.insert_formula(Formula::try_from(input)?)?;
        }

        self.exchange_rates.validate()?;

        let mut overrides = InMemoryClientPricing::new();
        for price_override in self.overrides {
            overrides.insert(price_override)?;
        }

        let mut matrices = TierMatrixSet::new();
        for source in &self.matrices {
            if matrices.get(&source.calculation_type).is_some() {
                return Err(SnapshotError::DuplicateMatrix(
                    source.calculation_type.clone(),
                ));
            }
            let table = source.read(base_dir)?;
            matrices.load(source.calculation_type.clone(), &table)?;
        }

        info!(
            "loaded snapshot: {} product(s), {} formula(s), {} override(s), {} matri(ces)",
            catalog.len(),
            catalog.formula_count(),
            overrides.len(),
            matrices.len()
        );

        Ok(LoadedCatalog {
            catalog,
            matrices,
            rates: self.exchange_rates,
            overrides,
        })
    }
}

/// A validated snapshot, ready to price against.
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub catalog: InMemoryCatalog,
    pub matrices: TierMatrixSet,
    pub rates: ExchangeRateTable,
    pub overrides: InMemoryClientPricing,
}

impl LoadedCatalog {
    /// Read and validate a snapshot file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        CatalogSnapshot::from_json(&json)?.build(base_dir)
    }

    /// Validate a snapshot held in memory. Matrix files resolve against the
    /// working directory.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        CatalogSnapshot::from_json(json)?.build(Path::new("."))
    }

    pub fn context(&self) -> PricingContext<'_> {
        PricingContext::new(&self.catalog, &self.matrices, &self.rates, &self.overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::product_catalog::ProductCatalog;
    use crate::core::client::ClientId;
    use crate::catalog::client_pricing::ClientPricingStore;
    use crate::core::exchange_rate::ExchangeRateProvider;
    use crate::core::product::{ProductId, RateName};
    use rust_decimal_macros::dec;

    const SNAPSHOT: &str = r#"{
        "products": [
            { "id": "RESIN", "calculation_type": "LIQUID", "reference_value": "0",
              "margin": "0.2", "cost": { "mode": "base_cost", "reference_cost": "2.00" } },
            { "id": "PAINT", "name": "Wall paint", "sale_unit": "l",
              "calculation_type": "LIQUID", "reference_value": "0", "margin": "0.25",
              "cost": { "mode": "computed_from_formula" }, "exchange_rate": "COMPANY" }
        ],
        "formulas": [
            { "product_id": "PAINT", "items": [ { "ingredient": "RESIN", "percentage": "100" } ] }
        ],
        "exchange_rates": { "OFFICIAL": "1000", "COMPANY": "1050" },
        "overrides": [
            { "client_id": "ACME", "product_id": "PAINT",
              "rule": { "mode": "fixed_unit_price", "value": "1800" } }
        ],
        "matrices": [
            { "calculation_type": "LIQUID", "table": ",,1,5\nref,label,1,5\n0,all,0.95,0.90\n" }
        ]
    }"#;

    #[test]
    fn test_load_inline_snapshot() {
        let loaded = LoadedCatalog::from_json(SNAPSHOT).unwrap();
        assert_eq!(loaded.catalog.len(), 2);
        assert_eq!(loaded.catalog.formula_count(), 1);
        assert_eq!(loaded.rates.rate(RateName::Company), Some(dec!(1050)));
        assert_eq!(loaded.matrices.len(), 1);

        let resin = loaded.catalog.get_product(&ProductId::new("RESIN")).unwrap();
        assert_eq!(resin.sale_unit, "kg");
        assert_eq!(resin.exchange_rate, RateName::Official);
        let paint = loaded.catalog.get_product(&ProductId::new("PAINT")).unwrap();
        assert_eq!(paint.exchange_rate, RateName::Company);
        assert!(loaded
            .overrides
            .get_active_override(&ClientId::new("ACME"), &ProductId::new("PAINT"))
            .is_some());
    }

    #[test]
    fn test_invalid_parts_rejected() {
        let bad_formula = SNAPSHOT.replace(r#""percentage": "100""#, r#""percentage": "90""#);
        assert!(matches!(
            LoadedCatalog::from_json(&bad_formula),
            Err(SnapshotError::Formula(FormulaError::PercentageSum { .. }))
        ));

        let bad_rate = SNAPSHOT.replace(r#""1050""#, r#""0""#);
        assert!(matches!(
            LoadedCatalog::from_json(&bad_rate),
            Err(SnapshotError::Rate(_))
        ));

        let bad_override = SNAPSHOT.replace(r#""1800""#, r#""-1""#);
        assert!(matches!(
            LoadedCatalog::from_json(&bad_override),
            Err(SnapshotError::Override(_))
        ));

        let bad_matrix = SNAPSHOT.replace("0.90", "x");
        assert!(matches!(
            LoadedCatalog::from_json(&bad_matrix),
            Err(SnapshotError::Matrix(MatrixError::InvalidNumber { .. }))
        ));

        let no_source = SNAPSHOT.replace(
            r#", "table": ",,1,5\nref,label,1,5\n0,all,0.95,0.90\n""#,
            "",
        );
        assert!(matches!(
            LoadedCatalog::from_json(&no_source),
            Err(SnapshotError::MissingMatrixSource(_))
        ));

        let twice_overridden = SNAPSHOT.replace(
            r#""overrides": ["#,
            r#""overrides": [
            { "client_id": "ACME", "product_id": "PAINT",
              "rule": { "mode": "fixed_unit_price", "value": "900" } },"#,
        );
        assert!(matches!(
            LoadedCatalog::from_json(&twice_overridden),
            Err(SnapshotError::Override(OverrideError::Duplicate { .. }))
        ));

        let twice_loaded = SNAPSHOT.replace(
            r#""matrices": ["#,
            r#""matrices": [
            { "calculation_type": "LIQUID", "table": ",,1
ref,label,1
0,all,0.5
" },"#,
        );
        assert!(matches!(
            LoadedCatalog::from_json(&twice_loaded),
            Err(SnapshotError::DuplicateMatrix(_))
        ));

        assert!(matches!(
            LoadedCatalog::from_json("{ not json"),
            Err(SnapshotError::Json(_))
        ));
    }

    #[test]
    fn test_matrix_file_relative_to_snapshot() {
        let dir = std::env::temp_dir().join(format!("pricing-snapshot-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("liquid.csv"), "a;b;1;5\nref;label;1;5\n0;all;0,95;0,90\n").unwrap();
        let snapshot = SNAPSHOT.replace(
            r#""table": ",,1,5\nref,label,1,5\n0,all,0.95,0.90\n""#,
            r#""file": "liquid.csv""#,
        );
        let path = dir.join("catalog.json");
        fs::write(&path, snapshot).unwrap();

        let loaded = LoadedCatalog::load(&path).unwrap();
        let matrix = loaded.matrices.get(&"LIQUID".into()).unwrap();
        assert_eq!(matrix.quantity_tiers(), &[dec!(1), dec!(5)]);

        fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(
            LoadedCatalog::load(&path),
            Err(SnapshotError::Io { .. })
        ));
    }

    #[test]
    fn test_round_trip_keeps_content() {
        let snapshot = CatalogSnapshot::from_json(SNAPSHOT).unwrap();
        let again = CatalogSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(again.products, snapshot.products);
        assert_eq!(again.matrices, snapshot.matrices);
    }
}
