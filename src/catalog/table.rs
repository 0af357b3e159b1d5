//! Columnar in-memory tables and named views

use super::{CatalogResult, Field, Schema, Value};

/// What to do when the destination of a copy does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateDisposition {
    /// Create the destination with the source schema
    #[default]
    CreateIfNeeded,
    /// Fail with `NotFound`
    CreateNever,
}

/// What to do when the destination of a copy already holds rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteDisposition {
    /// Keep existing rows and append
    #[default]
    WriteAppend,
    /// Replace existing rows
    WriteTruncate,
    /// Fail with `TableNotEmpty`
    WriteEmpty,
}

/// A named table: schema plus one value vector per column
///
/// Every column vector has exactly `num_rows` entries. REPEATED columns hold
/// one `Value::Array` per row.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    fields: Vec<Field>,
    schema: Schema,
    columns: Vec<Vec<Value>>,
    num_rows: usize,
}

impl Table {
    /// Create an empty table from (possibly nested) fields
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> CatalogResult<Self> {
        let schema = Schema::from_fields(&fields)?;
        let columns = vec![Vec::new(); schema.len()];
        Ok(Self {
            name: name.into(),
            fields,
            schema,
            columns,
            num_rows: 0,
        })
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flattened schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Fields as declared at creation
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Values of one column
    pub fn column(&self, index: usize) -> Option<&[Value]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    /// Values of one column by name
    pub fn column_by_name(&self, name: &str) -> Option<&[Value]> {
        self.schema
            .get_column_index(name)
            .and_then(|idx| self.column(idx))
    }

    /// One row, gathered across columns
    pub fn row(&self, index: usize) -> Option<Vec<Value>> {
        if index >= self.num_rows {
            return None;
        }
        Some(self.columns.iter().map(|c| c[index].clone()).collect())
    }

    /// Iterate rows in insertion order
    pub fn rows(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        (0..self.num_rows).map(move |i| self.columns.iter().map(|c| c[i].clone()).collect())
    }

    /// Append rows that are already checked against the schema
    pub(crate) fn append_rows(&mut self, rows: Vec<Vec<Value>>) {
        for row in rows {
            for (column, value) in self.columns.iter_mut().zip(row) {
                column.push(value);
            }
            self.num_rows += 1;
        }
    }

    /// Remove all rows
    pub(crate) fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        self.num_rows = 0;
    }
}

/// A named, stored query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    name: String,
    query: String,
}

impl View {
    /// Create a view
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
        }
    }

    /// View name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// SQL text
    pub fn query(&self) -> &str {
        &self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;

    #[test]
    fn test_append_and_read_rows() {
        let mut table = Table::new(
            "t",
            vec![
                Field::new("a", DataType::Integer),
                Field::new("b", DataType::String),
            ],
        )
        .unwrap();
        table.append_rows(vec![
            vec![Value::Integer(1), Value::from("x")],
            vec![Value::Integer(2), Value::Null],
        ]);

        assert_eq!(table.num_rows(), 2);
        assert_eq!(
            table.column_by_name("a").unwrap(),
            &[Value::Integer(1), Value::Integer(2)]
        );
        assert_eq!(table.row(1).unwrap(), vec![Value::Integer(2), Value::Null]);
        assert!(table.row(2).is_none());

        table.clear();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.rows().count(), 0);
    }
}
