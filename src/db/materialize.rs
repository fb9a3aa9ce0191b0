//! First-row materialization.

use super::{RawRow, ResultRow};

/// Builds the column-name to text mapping for the first row of `rows`.
///
/// The cursor is advanced at most once. An empty cursor yields an empty row.
/// Every value is coerced to its text rendering regardless of column type.
pub fn materialize_first_row<I>(rows: I) -> ResultRow
where
    I: IntoIterator<Item = RawRow>,
{
    let mut result = ResultRow::new();

    if let Some(first) = rows.into_iter().next() {
        for (column, value) in first.columns.into_iter().zip(first.values) {
            result.insert(column.name, value.to_text());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Value;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn row(cells: Vec<(&str, &str, Value)>) -> RawRow {
        RawRow::from_cells(cells)
    }

    #[test]
    fn test_empty_cursor_yields_empty_row() {
        let result = materialize_first_row(Vec::<RawRow>::new());
        assert!(result.is_empty());
    }

    #[test]
    fn test_single_row() {
        let result = materialize_first_row(Some(row(vec![("x", "INT4", Value::Int(1))])));
        let expected: ResultRow = [("x", "1")].into_iter().collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_only_first_row_is_materialized() {
        let rows = vec![
            row(vec![
                ("id", "INT4", Value::Int(1)),
                ("name", "TEXT", Value::String("first".to_string())),
            ]),
            row(vec![
                ("id", "INT4", Value::Int(2)),
                ("name", "TEXT", Value::String("second".to_string())),
            ]),
            row(vec![("other", "TEXT", Value::String("third".to_string()))]),
        ];

        let result = materialize_first_row(rows);

        assert_eq!(result.len(), 2);
        assert_eq!(result.get("id"), Some("1"));
        assert_eq!(result.get("name"), Some("first"));
        assert!(!result.contains_column("other"));
    }

    #[test]
    fn test_cursor_advanced_at_most_once() {
        let pulled = Cell::new(0);
        let rows = (0..5).map(|i| {
            pulled.set(pulled.get() + 1);
            row(vec![("n", "INT8", Value::Int(i))])
        });

        let result = materialize_first_row(rows);

        assert_eq!(result.get("n"), Some("0"));
        assert_eq!(pulled.get(), 1);
    }

    #[test]
    fn test_values_are_stringified_across_types() {
        let result = materialize_first_row(Some(row(vec![
            ("flag", "BOOL", Value::Bool(true)),
            ("ratio", "FLOAT8", Value::Float(0.5)),
            (
                "created",
                "TIMESTAMP",
                Value::String("2024-03-01 12:00:00".to_string()),
            ),
            ("blob", "BYTEA", Value::Bytes(vec![0x0a])),
            ("missing", "TEXT", Value::Null),
        ])));

        assert_eq!(result.get("flag"), Some("t"));
        assert_eq!(result.get("ratio"), Some("0.5"));
        assert_eq!(result.get("created"), Some("2024-03-01 12:00:00"));
        assert_eq!(result.get("blob"), Some("\\x0a"));
        assert!(result.is_null("missing"));
    }

    #[test]
    fn test_duplicate_column_names_keep_last() {
        let result = materialize_first_row(Some(row(vec![
            ("v", "INT4", Value::Int(1)),
            ("v", "INT4", Value::Int(2)),
        ])));
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("v"), Some("2"));
    }
}
