use std::sync::Arc;

use crate::{
    error::{Error, Result},
    types::canonical::{CanonicalType, CanonicalValue},
};

/// A single decoded row. Values are kept in column order.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<CanonicalValue>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<CanonicalValue>) -> Self {
        Self { columns, values }
    }

    /// Gets a value by zero-based column position.
    pub fn get(&self, index: usize) -> Option<&CanonicalValue> {
        self.values.get(index)
    }

    /// Gets a value by column name. Names are matched case-insensitively,
    /// the way most backends report them in upper or lower case.
    pub fn get_by_name(&self, column: &str) -> Result<&CanonicalValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| Error::ColumnNotFound(column.to_string()))
    }

    pub fn values(&self) -> &[CanonicalValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<CanonicalValue> {
        self.values
    }

    /// Returns the column names in this row.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result of a query, containing zero or more decoded rows.
#[derive(Debug, Clone)]
pub struct ResultSet {
    columns: Arc<[String]>,
    types: Vec<CanonicalType>,
    rows: Vec<Row>,
}

impl ResultSet {
    pub(crate) fn new(
        columns: Vec<String>,
        types: Vec<CanonicalType>,
        rows: Vec<Vec<CanonicalValue>>,
    ) -> Self {
        let columns: Arc<[String]> = columns.into();
        let rows = rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect();
        Self {
            columns,
            types,
            rows,
        }
    }

    /// Extracts a single row from the result.
    /// Returns an error if the result contains zero or more than one row.
    pub fn single_row(self) -> Result<Row> {
        let actual = self.rows.len();
        let mut rows = self.rows.into_iter();
        match (rows.next(), rows.next()) {
            (Some(row), None) => Ok(row),
            _ => Err(Error::UnexpectedRowCount {
                expected: 1,
                actual,
            }),
        }
    }

    pub fn rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn rows_ref(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Canonical type each column was decoded as.
    pub fn types(&self) -> &[CanonicalType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of a non-query statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    pub affected_rows: u64,
    /// Generated key of the inserted row, when the backend reports one.
    pub insert_id: Option<i64>,
}
