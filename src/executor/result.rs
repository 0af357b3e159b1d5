//! Query results

use std::fmt;

use crate::catalog::{Schema, Value};

/// Rows produced by a query, with their output schema
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Output columns in select-list order
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Rows in output order
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// All values of one output column
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.schema.get_column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_json_rows(&self) -> Vec<serde_json::Value> {
        let names = self.schema.names();
        self.rows
            .iter()
            .map(|row| {
                let object = names
                    .iter()
                    .zip(row)
                    .map(|(name, value)| (name.to_string(), value.to_json()))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect()
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header: Vec<String> = self.schema.names().iter().map(|s| s.to_string()).collect();
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(Value::to_string).collect())
            .collect();

        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let write_line = |f: &mut fmt::Formatter<'_>, line: &[String]| -> fmt::Result {
            let padded: Vec<String> = line
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect();
            writeln!(f, "| {} |", padded.join(" | "))
        };

        write_line(f, &header)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "|-{}-|", rule.join("-|-"))?;
        for row in &cells {
            write_line(f, row)?;
        }
        Ok(())
    }
}
