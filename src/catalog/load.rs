//! Row loading - coercion of raw JSON rows to typed table rows

use serde::Deserialize;

use super::value::parse_timestamp;
use super::{CatalogError, CatalogResult, ColumnDef, DataType, Field, Mode, Schema, Table, Value};

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaDocument {
    Fields(Vec<Field>),
    Wrapped { fields: Vec<Field> },
}

/// Parse a BigQuery JSON schema
///
/// Accepts either a bare field list or an object with a `fields` member.
pub fn schema_from_json(text: &str) -> CatalogResult<Vec<Field>> {
    let doc: SchemaDocument =
        serde_json::from_str(text).map_err(|e| CatalogError::InvalidSchema(e.to_string()))?;
    let fields = match doc {
        SchemaDocument::Fields(fields) => fields,
        SchemaDocument::Wrapped { fields } => fields,
    };
    Schema::from_fields(&fields)?;
    Ok(fields)
}

/// Split newline-delimited JSON into rows, skipping blank lines
pub(crate) fn parse_ndjson(table: &str, text: &str) -> CatalogResult<Vec<serde_json::Value>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(row, line)| {
            serde_json::from_str(line).map_err(|e| CatalogError::SchemaMismatch {
                table: table.to_string(),
                row,
                column: None,
                reason: format!("invalid JSON: {}", e),
            })
        })
        .collect()
}

/// Coerce raw rows to the table schema, failing on the first bad row
pub(crate) fn coerce_rows(
    table: &Table,
    rows: &[serde_json::Value],
) -> CatalogResult<Vec<Vec<Value>>> {
    let schema = table.schema();
    rows.iter()
        .enumerate()
        .map(|(row_idx, raw)| {
            let mismatch = |column: Option<&str>, reason: String| CatalogError::SchemaMismatch {
                table: table.name().to_string(),
                row: row_idx,
                column: column.map(str::to_string),
                reason,
            };

            let cells: Vec<serde_json::Value> = match raw {
                serde_json::Value::Array(items) => {
                    if items.len() != schema.len() {
                        return Err(mismatch(
                            None,
                            format!("expected {} values, got {}", schema.len(), items.len()),
                        ));
                    }
                    items.clone()
                }
                serde_json::Value::Object(_) => schema
                    .columns()
                    .iter()
                    .map(|col| lookup_path(raw, &col.name))
                    .collect(),
                other => {
                    return Err(mismatch(
                        None,
                        format!("row must be a JSON array or object, got {}", other),
                    ))
                }
            };

            schema
                .columns()
                .iter()
                .zip(cells.iter())
                .map(|(col, cell)| {
                    coerce_cell(col, cell).map_err(|reason| mismatch(Some(&col.name), reason))
                })
                .collect()
        })
        .collect()
}

/// Find the JSON value for a flattened column name in a keyed row
///
/// A flat `a.b` key wins; otherwise nested objects are walked, and arrays of
/// records along the way collect one leaf per element.
fn lookup_path(row: &serde_json::Value, name: &str) -> serde_json::Value {
    if let Some(v) = row.get(name) {
        return v.clone();
    }
    let parts: Vec<&str> = name.split('.').collect();
    walk(row, &parts)
}

fn walk(node: &serde_json::Value, parts: &[&str]) -> serde_json::Value {
    let Some((first, rest)) = parts.split_first() else {
        return node.clone();
    };
    match node {
        serde_json::Value::Object(map) => match map.get(*first) {
            Some(child) => walk(child, rest),
            None => serde_json::Value::Null,
        },
        serde_json::Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                match walk(item, parts) {
                    serde_json::Value::Array(inner) => out.extend(inner),
                    serde_json::Value::Null => {}
                    v => out.push(v),
                }
            }
            serde_json::Value::Array(out)
        }
        _ => serde_json::Value::Null,
    }
}

fn coerce_cell(col: &ColumnDef, raw: &serde_json::Value) -> Result<Value, String> {
    match (col.mode, raw) {
        (Mode::Repeated, serde_json::Value::Null) => Ok(Value::Array(Vec::new())),
        (Mode::Repeated, serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| {
                if item.is_null() {
                    Err("REPEATED elements cannot be NULL".to_string())
                } else {
                    coerce_scalar(col.data_type, item)
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (Mode::Repeated, other) => Err(format!("REPEATED column needs an array, got {}", other)),
        (Mode::Required, serde_json::Value::Null) => {
            Err("REQUIRED column given NULL".to_string())
        }
        (Mode::Nullable, serde_json::Value::Null) => Ok(Value::Null),
        (_, v) => coerce_scalar(col.data_type, v),
    }
}

fn coerce_scalar(data_type: DataType, raw: &serde_json::Value) -> Result<Value, String> {
    use serde_json::Value as J;

    let fail = || format!("cannot convert {} to {}", raw, data_type);
    match data_type {
        DataType::Integer => match raw {
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => {
                            Ok(Value::Integer(f as i64))
                        }
                        _ => Err(fail()),
                    }
                }
            }
            J::String(s) => s.trim().parse::<i64>().map(Value::Integer).map_err(|_| fail()),
            _ => Err(fail()),
        },
        DataType::Float => match raw {
            J::Number(n) => n.as_f64().map(Value::Float).ok_or_else(fail),
            J::String(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| fail()),
            _ => Err(fail()),
        },
        DataType::Boolean => match raw {
            J::Bool(b) => Ok(Value::Boolean(*b)),
            J::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Boolean(true)),
            J::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Boolean(false)),
            _ => Err(fail()),
        },
        DataType::String => match raw {
            J::String(s) => Ok(Value::String(s.clone())),
            J::Number(n) => Ok(Value::String(n.to_string())),
            J::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(fail()),
        },
        DataType::Timestamp => match raw {
            J::String(s) => parse_timestamp(s).map(Value::Timestamp).ok_or_else(fail),
            J::Number(n) => n.as_i64().map(Value::Timestamp).ok_or_else(fail),
            _ => Err(fail()),
        },
        DataType::Record | DataType::Null => Err(fail()),
    }
}

/// Check typed rows against the table schema
///
/// INTEGER values stored into FLOAT columns are widened.
pub(crate) fn check_values(table: &Table, rows: Vec<Vec<Value>>) -> CatalogResult<Vec<Vec<Value>>> {
    let schema = table.schema();
    rows.into_iter()
        .enumerate()
        .map(|(row_idx, row)| {
            let mismatch = |column: Option<&str>, reason: String| CatalogError::SchemaMismatch {
                table: table.name().to_string(),
                row: row_idx,
                column: column.map(str::to_string),
                reason,
            };
            if row.len() != schema.len() {
                return Err(mismatch(
                    None,
                    format!("expected {} values, got {}", schema.len(), row.len()),
                ));
            }
            schema
                .columns()
                .iter()
                .zip(row)
                .map(|(col, value)| {
                    check_cell(col, value).map_err(|reason| mismatch(Some(&col.name), reason))
                })
                .collect()
        })
        .collect()
}

fn check_cell(col: &ColumnDef, value: Value) -> Result<Value, String> {
    match (col.mode, value) {
        (Mode::Repeated, Value::Null) => Ok(Value::Array(Vec::new())),
        (Mode::Repeated, Value::Array(items)) => items
            .into_iter()
            .map(|item| check_scalar(col.data_type, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (Mode::Repeated, other) => Err(format!("REPEATED column needs an array, got {}", other)),
        (_, Value::Array(_)) => Err("array given for a non-REPEATED column".to_string()),
        (Mode::Required, Value::Null) => Err("REQUIRED column given NULL".to_string()),
        (Mode::Nullable, Value::Null) => Ok(Value::Null),
        (_, v) => check_scalar(col.data_type, v),
    }
}

fn check_scalar(data_type: DataType, value: Value) -> Result<Value, String> {
    match (data_type, value) {
        (_, Value::Null) => Err("REPEATED elements cannot be NULL".to_string()),
        (DataType::Float, Value::Integer(i)) => Ok(Value::Float(i as f64)),
        (t, v) if v.data_type() == t => Ok(v),
        (t, v) => Err(format!("expected {}, got {}", t, v.data_type())),
    }
}

/// Reorder rows from `source` column order into `table` column order
///
/// Destination columns absent from the source are filled with NULL.
pub(crate) fn align_by_name(
    table: &Table,
    source: &Schema,
    rows: Vec<Vec<Value>>,
) -> CatalogResult<Vec<Vec<Value>>> {
    let dest = table.schema();
    if dest == source {
        return Ok(rows);
    }
    for col in source.columns() {
        if dest.get_column(&col.name).is_none() {
            return Err(CatalogError::SchemaMismatch {
                table: table.name().to_string(),
                row: 0,
                column: Some(col.name.clone()),
                reason: "column does not exist in destination".to_string(),
            });
        }
    }
    let mapping: Vec<Option<usize>> = dest
        .columns()
        .iter()
        .map(|c| source.get_column_index(&c.name))
        .collect();
    Ok(rows
        .into_iter()
        .map(|row| {
            mapping
                .iter()
                .map(|idx| idx.and_then(|i| row.get(i).cloned()).unwrap_or(Value::Null))
                .collect()
        })
        .collect())
}
