//! Two-axis coefficient tables.
//!
//! A tier matrix maps (reference-value tier, quantity tier) to a pricing
//! coefficient. Matrices are parsed once from tabular text, validated
//! strictly, sorted, and never mutated afterwards.
//!
//! Input layout, one matrix per calculation type:
//!
//! ```text
//! ,,1,5,10            <- two ignored cells, then quantity tiers
//! ref,label,1u,5u,10u <- ignored label row
//! 0,a,"0,95",0.90,0.85
//! 50,b,0.93,,0.80     <- blank cell: unsellable combination
//! ```

use crate::core::error::{MatrixError, PricingError};
use crate::core::product::CalculationType;
use log::debug;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

/// Result of a successful matrix lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLookup {
    pub coefficient: Decimal,
    pub reference_tier_used: Decimal,
    pub quantity_tier_used: Decimal,
    pub reference_index: usize,
    pub quantity_index: usize,
}

/// An immutable, pre-sorted coefficient grid for one calculation type.
#[derive(Debug, Clone, PartialEq)]
pub struct TierMatrix {
    calculation_type: CalculationType,
    /// Ascending, unique.
    reference_tiers: Vec<Decimal>,
    /// Ascending, unique, positive.
    quantity_tiers: Vec<Decimal>,
    /// `cells[reference_index][quantity_index]`; `None` is unsellable.
    cells: Vec<Vec<Option<Decimal>>>,
}

impl TierMatrix {
    /// Parse and validate the tabular form of a matrix.
    ///
    /// # Examples
    ///
    /// ```
    /// use pricing_engine::pricing::tier_matrix::TierMatrix;
    /// use pricing_engine::core::product::CalculationType;
    /// use rust_decimal_macros::dec;
    ///
    /// let matrix = TierMatrix::parse(
    ///     CalculationType::new("LIQUID"),
    ///     ",,1,5\nref,label,one,five\n0,,0.95,0.90\n",
    /// )
    /// .unwrap();
    ///
    /// let hit = matrix.lookup(dec!(3), dec!(7)).unwrap();
    /// assert_eq!(hit.coefficient, dec!(0.90));
    /// assert_eq!(hit.quantity_tier_used, dec!(5));
    /// ```
    pub fn parse(calculation_type: CalculationType, input: &str) -> Result<Self, MatrixError> {
        // Rows 1 and 2 are fixed by position; blank lines are only skipped
        // among the reference rows.
        let mut lines = input.lines().enumerate().map(|(i, line)| (i + 1, line));

        let (header_row, header) = lines
            .next()
            .filter(|(_, line)| !line.trim().is_empty())
            .ok_or_else(|| MatrixError::MissingHeader(calculation_type.clone()))?;
        let delimiter = detect_delimiter(header);

        let header_cells = trim_trailing_blanks(split_cells(header, delimiter));
        let mut quantity_columns = Vec::new();
        for (column, cell) in header_cells.iter().enumerate().skip(2) {
            let tier = parse_number(cell)
                .map_err(|value| invalid_number(&calculation_type, header_row, column, value))?
                .ok_or_else(|| invalid_number(&calculation_type, header_row, column, ""))?;
            if tier <= Decimal::ZERO {
                return Err(MatrixError::NonPositive {
                    calculation_type,
                    row: header_row,
                    column: column + 1,
                    value: tier,
                });
            }
            quantity_columns.push(tier);
        }
        if quantity_columns.is_empty() {
            return Err(MatrixError::NoQuantityTiers(calculation_type));
        }

        // Second row is a human-readable label header, possibly empty.
        let _labels = lines.next();

        let mut rows: Vec<(Decimal, Vec<Option<Decimal>>)> = Vec::new();
        for (row, line) in lines.filter(|(_, line)| !line.trim().is_empty()) {
            let cells = trim_trailing_blanks(split_cells(line, delimiter));
            let reference = match cells.first().map(|c| parse_number(c)) {
                Some(Ok(Some(value))) => value,
                Some(Err(value)) => {
                    return Err(invalid_number(&calculation_type, row, 0, value));
                }
                _ => {
                    return Err(MatrixError::MissingReferenceTier {
                        calculation_type,
                        row,
                    })
                }
            };

            let coefficients = cells.get(2..).unwrap_or(&[]);
            if coefficients.len() > quantity_columns.len() {
                return Err(MatrixError::TooManyCells {
                    calculation_type,
                    row,
                    expected: quantity_columns.len(),
                    found: coefficients.len(),
                });
            }

            let mut values = vec![None; quantity_columns.len()];
            for (offset, cell) in coefficients.iter().enumerate() {
                let column = offset + 2;
                let value = parse_number(cell)
                    .map_err(|value| invalid_number(&calculation_type, row, column, value))?;
                if let Some(coefficient) = value {
                    if coefficient <= Decimal::ZERO {
                        return Err(MatrixError::NonPositive {
                            calculation_type,
                            row,
                            column: column + 1,
                            value: coefficient,
                        });
                    }
                }
                values[offset] = value;
            }
            rows.push((reference, values));
        }
        if rows.is_empty() {
            return Err(MatrixError::NoReferenceTiers(calculation_type));
        }

        // Sort both axes once so lookups can binary-search.
        let mut order: Vec<usize> = (0..quantity_columns.len()).collect();
        order.sort_by(|a, b| quantity_columns[*a].cmp(&quantity_columns[*b]));
        let quantity_tiers: Vec<Decimal> = order.iter().map(|&i| quantity_columns[i]).collect();
        if let Some(tier) = first_duplicate(&quantity_tiers) {
            return Err(MatrixError::DuplicateTier {
                calculation_type,
                axis: "quantity",
                tier,
            });
        }

        rows.sort_by(|a, b| a.0.cmp(&b.0));
        let reference_tiers: Vec<Decimal> = rows.iter().map(|(tier, _)| *tier).collect();
        if let Some(tier) = first_duplicate(&reference_tiers) {
            return Err(MatrixError::DuplicateTier {
                calculation_type,
                axis: "reference",
                tier,
            });
        }

        let cells = rows
            .into_iter()
            .map(|(_, values)| order.iter().map(|&i| values[i]).collect())
            .collect();

        debug!(
            "loaded tier matrix {} ({} reference x {} quantity tiers)",
            calculation_type,
            reference_tiers.len(),
            quantity_tiers.len()
        );

        Ok(Self {
            calculation_type,
            reference_tiers,
            quantity_tiers,
            cells,
        })
    }

    /// Look up the coefficient for a reference value and quantity.
    ///
    /// Each axis independently picks the largest tier not above the input,
    /// clamping to the smallest tier when the input is below all of them.
    /// Returns `None` when the selected cell is blank.
    pub fn lookup(&self, reference_value: Decimal, quantity: Decimal) -> Option<TierLookup> {
        let reference_index = select_tier(&self.reference_tiers, reference_value);
        let quantity_index = select_tier(&self.quantity_tiers, quantity);
        let coefficient = self.cells[reference_index][quantity_index]?;
        Some(TierLookup {
            coefficient,
            reference_tier_used: self.reference_tiers[reference_index],
            quantity_tier_used: self.quantity_tiers[quantity_index],
            reference_index,
            quantity_index,
        })
    }

    pub fn calculation_type(&self) -> &CalculationType {
        &self.calculation_type
    }

    pub fn reference_tiers(&self) -> &[Decimal] {
        &self.reference_tiers
    }

    pub fn quantity_tiers(&self) -> &[Decimal] {
        &self.quantity_tiers
    }
}

/// Index of the largest tier `<= value`, or 0 when `value` is below every
/// tier. `tiers` must be non-empty and ascending.
fn select_tier(tiers: &[Decimal], value: Decimal) -> usize {
    tiers.partition_point(|tier| *tier <= value).saturating_sub(1)
}

fn first_duplicate(sorted: &[Decimal]) -> Option<Decimal> {
    sorted.windows(2).find(|w| w[0] == w[1]).map(|w| w[0])
}

fn detect_delimiter(header: &str) -> char {
    if header.contains(';') {
        ';'
    } else if header.contains('\t') {
        '\t'
    } else {
        ','
    }
}

/// Split a row on `delimiter`, honouring double quotes so that `"0,95"`
/// stays one cell.
fn split_cells(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in line.chars() {
        match ch {
            '"' => quoted = !quoted,
            c if c == delimiter && !quoted => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn trim_trailing_blanks(mut cells: Vec<String>) -> Vec<String> {
    while cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

/// Blank cells parse to `Ok(None)`; a comma decimal separator is accepted.
fn parse_number(cell: &str) -> Result<Option<Decimal>, &str> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let normalized = trimmed.replace(',', ".");
    Decimal::from_str(&normalized)
        .map(|d| Some(d.normalize()))
        .map_err(|_| trimmed)
}

fn invalid_number(
    calculation_type: &CalculationType,
    row: usize,
    column: usize,
    value: &str,
) -> MatrixError {
    MatrixError::InvalidNumber {
        calculation_type: calculation_type.clone(),
        row,
        column: column + 1,
        value: value.to_string(),
    }
}

/// All loaded matrices, keyed by calculation type.
#[derive(Debug, Clone, Default)]
pub struct TierMatrixSet {
    matrices: HashMap<CalculationType, TierMatrix>,
}

impl TierMatrixSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a matrix, replacing any previous one for the same type.
    pub fn insert(&mut self, matrix: TierMatrix) {
        self.matrices
            .insert(matrix.calculation_type().clone(), matrix);
    }

    /// Parse `input` and add it under `calculation_type`.
    pub fn load(
        &mut self,
        calculation_type: CalculationType,
        input: &str,
    ) -> Result<(), MatrixError> {
        self.insert(TierMatrix::parse(calculation_type, input)?);
        Ok(())
    }

    pub fn get(&self, calculation_type: &CalculationType) -> Option<&TierMatrix> {
        self.matrices.get(calculation_type)
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Look up a coefficient. A missing matrix and a blank cell both mean
    /// there is no coefficient to price with.
    pub fn lookup(
        &self,
        calculation_type: &CalculationType,
        reference_value: Decimal,
        quantity: Decimal,
    ) -> Result<TierLookup, PricingError> {
        self.get(calculation_type)
            .and_then(|m| m.lookup(reference_value, quantity))
            .ok_or_else(|| PricingError::CoefficientNotFound {
                calculation_type: calculation_type.clone(),
                reference_value,
                quantity,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const LIQUID: &str = "\
,,1,5,10
ref,label,1 kg,5 kg,10 kg
0,small,\"0,95\",0.90,0.85
50,mid,0.93,,0.80
100,large,0.91,0.88,0.78
";

    fn liquid() -> TierMatrix {
        TierMatrix::parse(CalculationType::new("LIQUID"), LIQUID).unwrap()
    }

    #[test]
    fn test_parse_shape() {
        let m = liquid();
        assert_eq!(m.reference_tiers(), &[dec!(0), dec!(50), dec!(100)]);
        assert_eq!(m.quantity_tiers(), &[dec!(1), dec!(5), dec!(10)]);
    }

    #[test]
    fn test_comma_decimal_separator() {
        let hit = liquid().lookup(dec!(0), dec!(1)).unwrap();
        assert_eq!(hit.coefficient, dec!(0.95));
    }

    #[test]
    fn test_exact_and_between_tiers() {
        let m = liquid();
        let hit = m.lookup(dec!(50), dec!(10)).unwrap();
        assert_eq!(hit.coefficient, dec!(0.80));

        let hit = m.lookup(dec!(99.9), dec!(10)).unwrap();
        assert_eq!(hit.reference_tier_used, dec!(50));
        assert_eq!(hit.quantity_tier_used, dec!(10));
        assert_eq!(hit.coefficient, dec!(0.80));

        let hit = m.lookup(dec!(100), dec!(9.99)).unwrap();
        assert_eq!(hit.quantity_tier_used, dec!(5));
        assert_eq!(hit.coefficient, dec!(0.88));
    }

    #[test]
    fn test_blank_cell_is_not_found() {
        let m = liquid();
        // (50, 5) is blank
        assert!(m.lookup(dec!(60), dec!(6)).is_none());
    }

    #[test]
    fn test_clamps_below_smallest_tier() {
        let m = liquid();
        let hit = m.lookup(dec!(-5), dec!(0.5)).unwrap();
        assert_eq!(hit.reference_tier_used, dec!(0));
        assert_eq!(hit.quantity_tier_used, dec!(1));
        assert_eq!(hit.coefficient, dec!(0.95));
    }

    #[test]
    fn test_above_largest_tier_uses_largest() {
        let hit = liquid().lookup(dec!(5000), dec!(1000)).unwrap();
        assert_eq!(hit.reference_tier_used, dec!(100));
        assert_eq!(hit.quantity_tier_used, dec!(10));
        assert_eq!(hit.coefficient, dec!(0.78));
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let input = ";;10;1\nlabels\n100;x;0,7;0,9\n0;y;0,8;1\n";
        let m = TierMatrix::parse(CalculationType::new("POWDER"), input).unwrap();
        assert_eq!(m.quantity_tiers(), &[dec!(1), dec!(10)]);
        assert_eq!(m.reference_tiers(), &[dec!(0), dec!(100)]);
        assert_eq!(m.lookup(dec!(0), dec!(1)).unwrap().coefficient, dec!(1));
        assert_eq!(m.lookup(dec!(100), dec!(10)).unwrap().coefficient, dec!(0.7));
    }

    #[test]
    fn test_blank_label_row_keeps_first_reference_tier() {
        let input = ",,1,5\n\n0,,0.95,0.90\n\n100,,0.50,0.40\n";
        let m = TierMatrix::parse(CalculationType::new("X"), input).unwrap();
        assert_eq!(m.reference_tiers(), &[dec!(0), dec!(100)]);
        assert_eq!(m.lookup(dec!(50), dec!(1)).unwrap().coefficient, dec!(0.95));
    }

    #[test]
    fn test_rejects_bad_cell() {
        let input = ",,1\nlabels\n0,,abc\n";
        let err = TierMatrix::parse(CalculationType::new("X"), input).unwrap_err();
        assert_eq!(
            err,
            MatrixError::InvalidNumber {
                calculation_type: CalculationType::new("X"),
                row: 3,
                column: 3,
                value: "abc".to_string(),
            }
        );
    }

    #[test]
    fn test_rejects_structural_problems() {
        let t = || CalculationType::new("X");
        assert!(matches!(
            TierMatrix::parse(t(), ""),
            Err(MatrixError::MissingHeader(_))
        ));
        assert!(matches!(
            TierMatrix::parse(t(), "\n,,1\nlabels\n0,,1\n"),
            Err(MatrixError::MissingHeader(_))
        ));
        assert!(matches!(
            TierMatrix::parse(t(), ",\nlabels\n0,,1\n"),
            Err(MatrixError::NoQuantityTiers(_))
        ));
        assert!(matches!(
            TierMatrix::parse(t(), ",,1\nlabels\n"),
            Err(MatrixError::NoReferenceTiers(_))
        ));
        assert!(matches!(
            TierMatrix::parse(t(), ",,1,1\nlabels\n0,,1,1\n"),
            Err(MatrixError::DuplicateTier { axis: "quantity", .. })
        ));
        assert!(matches!(
            TierMatrix::parse(t(), ",,1\nlabels\n0,,1\n0.0,,1\n"),
            Err(MatrixError::DuplicateTier { axis: "reference", .. })
        ));
        assert!(matches!(
            TierMatrix::parse(t(), ",,1\nlabels\n0,,1,2\n"),
            Err(MatrixError::TooManyCells { .. })
        ));
        assert!(matches!(
            TierMatrix::parse(t(), ",,0\nlabels\n0,,1\n"),
            Err(MatrixError::NonPositive { .. })
        ));
        assert!(matches!(
            TierMatrix::parse(t(), ",,1\nlabels\n,,1\n"),
            Err(MatrixError::MissingReferenceTier { .. })
        ));
    }

    #[test]
    fn test_set_lookup_unknown_type() {
        let mut set = TierMatrixSet::new();
        set.insert(liquid());
        assert!(set.lookup(&CalculationType::new("LIQUID"), dec!(0), dec!(1)).is_ok());
        let err = set
            .lookup(&CalculationType::new("GAS"), dec!(0), dec!(1))
            .unwrap_err();
        assert_eq!(err.code(), "COEFFICIENT_NOT_FOUND");
    }
}
