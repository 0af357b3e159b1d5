//! Row type - one tuple of values flowing between operators

use crate::catalog::Value;

use super::error::{ExecutorError, ExecutorResult};

/// A row of values
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create a new row with the given values
    pub fn new(values: Vec<Value>) -> Self {
        Row { values }
    }

    /// Create an empty row
    pub fn empty() -> Self {
        Row { values: vec![] }
    }

    /// Number of columns in this row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by index
    pub fn get(&self, index: usize) -> ExecutorResult<&Value> {
        self.values
            .get(index)
            .ok_or(ExecutorError::ColumnIndexOutOfBounds {
                index,
                row_len: self.values.len(),
            })
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Concatenate two rows (left columns first)
    pub fn concat(&self, other: &Row) -> Row {
        let mut values = Vec::with_capacity(self.len() + other.len());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&other.values);
        Row { values }
    }

    /// Keep only the first `width` values
    pub fn truncate(&mut self, width: usize) {
        self.values.truncate(width);
    }

    /// Values from `start` on; empty when `start` is past the end
    pub fn tail(&self, start: usize) -> &[Value] {
        self.values.get(start..).unwrap_or(&[])
    }

    /// Values before `end` (the whole row when it is shorter)
    pub fn head(&self, end: usize) -> &[Value] {
        &self.values[..end.min(self.values.len())]
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
