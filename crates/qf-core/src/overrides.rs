//! Coefficient overrides loaded from a CSV file.
//!
//! The file needs a header row with `id` and `coefficient` columns; other
//! columns are ignored. Column checks happen before any data row is read and
//! a single bad row fails the whole load.

use std::collections::HashMap;

use crate::error::OverridesError;

const ID_COLUMN: &str = "id";
const COEFFICIENT_COLUMN: &str = "coefficient";

/// Explicit coefficients keyed by vote id. A present entry replaces the
/// computed coefficient outright.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoefficientOverrides {
    entries: HashMap<String, f64>,
}

impl CoefficientOverrides {
    pub fn get(&self, id: &str) -> Option<f64> {
        self.entries.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, f64)> for CoefficientOverrides {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Parse an overrides CSV.
///
/// Row numbers in [`OverridesError::InvalidRow`] count data rows from 1
/// (the header is not counted). Duplicate ids keep the last value.
pub fn parse_coefficient_overrides(bytes: &[u8]) -> Result<CoefficientOverrides, OverridesError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| OverridesError::Malformed(e.to_string()))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| OverridesError::ColumnNotFound(name.to_string()))
    };
    let id_idx = column(ID_COLUMN)?;
    let coefficient_idx = column(COEFFICIENT_COLUMN)?;

    let mut entries = HashMap::new();
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = record.map_err(|e| OverridesError::Malformed(format!("row {row}: {e}")))?;
        let id = record.get(id_idx).unwrap_or_default();
        let raw = record.get(coefficient_idx).unwrap_or_default();

        let coefficient = raw
            .parse::<f64>()
            .ok()
            .filter(|c| c.is_finite())
            .ok_or_else(|| OverridesError::InvalidRow {
                row,
                value: raw.to_string(),
            })?;

        entries.insert(id.to_string(), coefficient);
    }

    Ok(CoefficientOverrides { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_id_and_coefficient() {
        let csv = "id,coefficient\n0xa,0.5\n0xb,1\n";
        let o = parse_coefficient_overrides(csv.as_bytes()).unwrap();
        assert_eq!(o.len(), 2);
        assert_eq!(o.get("0xa"), Some(0.5));
        assert_eq!(o.get("0xb"), Some(1.0));
        assert_eq!(o.get("0xc"), None);
    }

    #[test]
    fn extra_columns_and_order_ignored() {
        let csv = "note,coefficient,id\nhello,0.25,0xa\n";
        let o = parse_coefficient_overrides(csv.as_bytes()).unwrap();
        assert_eq!(o.get("0xa"), Some(0.25));
    }

    #[test]
    fn whitespace_trimmed() {
        let csv = "id , coefficient\n 0xa ,  0.75 \n";
        let o = parse_coefficient_overrides(csv.as_bytes()).unwrap();
        assert_eq!(o.get("0xa"), Some(0.75));
    }

    #[test]
    fn missing_coefficient_column_fails_before_rows() {
        // The data row is also invalid; the column error must win.
        let csv = "id,weight\n0xa,abc\n";
        let err = parse_coefficient_overrides(csv.as_bytes()).unwrap_err();
        assert_eq!(err, OverridesError::ColumnNotFound("coefficient".into()));
    }

    #[test]
    fn missing_id_column() {
        let csv = "vote,coefficient\n0xa,1\n";
        let err = parse_coefficient_overrides(csv.as_bytes()).unwrap_err();
        assert_eq!(err, OverridesError::ColumnNotFound("id".into()));
    }

    #[test]
    fn unparsable_coefficient_names_row() {
        let csv = "id,coefficient\n0xa,1\n0xb,abc\n";
        let err = parse_coefficient_overrides(csv.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            OverridesError::InvalidRow {
                row: 2,
                value: "abc".into()
            }
        );
    }

    #[test]
    fn non_finite_coefficient_rejected() {
        for bad in ["NaN", "inf", "-inf"] {
            let csv = format!("id,coefficient\n0xa,{bad}\n");
            let err = parse_coefficient_overrides(csv.as_bytes()).unwrap_err();
            assert_eq!(
                err,
                OverridesError::InvalidRow {
                    row: 1,
                    value: bad.into()
                }
            );
        }
    }

    #[test]
    fn duplicate_id_last_wins() {
        let csv = "id,coefficient\n0xa,0.1\n0xa,0.9\n";
        let o = parse_coefficient_overrides(csv.as_bytes()).unwrap();
        assert_eq!(o.len(), 1);
        assert_eq!(o.get("0xa"), Some(0.9));
    }

    #[test]
    fn header_only_is_empty() {
        let o = parse_coefficient_overrides(b"id,coefficient\n").unwrap();
        assert!(o.is_empty());
    }

    #[test]
    fn ragged_row_is_malformed() {
        let csv = "id,coefficient\n0xa,1,extra\n";
        let err = parse_coefficient_overrides(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, OverridesError::Malformed(_)));
    }
}
