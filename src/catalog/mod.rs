//! Catalog - table schemas, table contents and the table registry
//!
//! The catalog owns every table and view a query can reference. It is an
//! explicit value rather than global state: tests create their own `Catalog`,
//! and several independent catalogs can live in one process. Lifecycle
//! operations (create/delete/load) are methods on it; queries borrow it
//! immutably.

pub mod load;
pub mod table;
pub mod value;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::executor::ResultTable;

pub use load::schema_from_json;
pub use table::{CreateDisposition, Table, View, WriteDisposition};
pub use value::Value;

/// Column value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    /// 64-bit signed integer
    Integer,
    /// 64-bit floating point
    Float,
    /// Boolean (true/false)
    Boolean,
    /// UTF-8 string
    String,
    /// Microsecond-precision UTC timestamp
    Timestamp,
    /// Nested record; its sub-fields live on the owning `Field`
    Record,
    /// Type of an untyped NULL literal
    Null,
}

impl DataType {
    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }

    /// Check if a value of this type can stand in for `other`
    ///
    /// The NULL type is compatible with everything.
    pub fn is_compatible(&self, other: DataType) -> bool {
        *self == other || *self == DataType::Null || other == DataType::Null
    }

    /// Type name as written in schemas
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::Boolean => "BOOLEAN",
            DataType::String => "STRING",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Record => "RECORD",
            DataType::Null => "NULL",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INTEGER" | "INT64" => Ok(DataType::Integer),
            "FLOAT" | "FLOAT64" => Ok(DataType::Float),
            "BOOLEAN" | "BOOL" => Ok(DataType::Boolean),
            "STRING" => Ok(DataType::String),
            "TIMESTAMP" => Ok(DataType::Timestamp),
            "RECORD" | "STRUCT" => Ok(DataType::Record),
            _ => Err(CatalogError::InvalidSchema(format!("unknown type '{}'", s))),
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = CatalogError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DataType> for String {
    fn from(t: DataType) -> Self {
        t.name().to_string()
    }
}

/// Column cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mode {
    /// Exactly one value per row
    Required,
    /// Zero or one value per row
    #[default]
    Nullable,
    /// A list of zero or more values per row
    Repeated,
}

impl Mode {
    /// Mode name as written in schemas
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Required => "REQUIRED",
            Mode::Nullable => "NULLABLE",
            Mode::Repeated => "REPEATED",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "REQUIRED" => Ok(Mode::Required),
            "NULLABLE" => Ok(Mode::Nullable),
            "REPEATED" => Ok(Mode::Repeated),
            _ => Err(CatalogError::InvalidSchema(format!("unknown mode '{}'", s))),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = CatalogError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Mode> for String {
    fn from(m: Mode) -> Self {
        m.name().to_string()
    }
}

/// A (possibly nested) schema field in BigQuery's JSON schema shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Field type
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Cardinality
    #[serde(default)]
    pub mode: Mode,
    /// Sub-fields of a RECORD
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

impl Field {
    /// Create a NULLABLE leaf field
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            mode: Mode::Nullable,
            fields: Vec::new(),
        }
    }

    /// Create a NULLABLE record field
    pub fn record(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Record,
            mode: Mode::Nullable,
            fields,
        }
    }

    /// Set the mode
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Mark REQUIRED
    #[must_use]
    pub fn required(self) -> Self {
        self.mode(Mode::Required)
    }

    /// Mark REPEATED
    #[must_use]
    pub fn repeated(self) -> Self {
        self.mode(Mode::Repeated)
    }
}

/// Flat column definition (records are already expanded to `parent.child`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Cardinality
    pub mode: Mode,
}

impl ColumnDef {
    /// Create a new NULLABLE column definition
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            mode: Mode::Nullable,
        }
    }

    /// Set the mode
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

/// Ordered list of uniquely named columns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<ColumnDef>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column
    #[must_use]
    pub fn column(mut self, col: ColumnDef) -> Self {
        self.columns.push(col);
        self
    }

    /// Build a schema from columns, rejecting duplicate names
    pub fn from_columns(columns: Vec<ColumnDef>) -> CatalogResult<Self> {
        let mut seen = HashSet::new();
        for col in &columns {
            if col.data_type == DataType::Record {
                return Err(CatalogError::InvalidSchema(format!(
                    "column '{}' is a RECORD; records must be flattened",
                    col.name
                )));
            }
            if !seen.insert(col.name.as_str()) {
                return Err(CatalogError::InvalidSchema(format!(
                    "duplicate column '{}'",
                    col.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Flatten nested fields into leaf columns
    ///
    /// A leaf beneath a REPEATED record is itself REPEATED.
    pub fn from_fields(fields: &[Field]) -> CatalogResult<Self> {
        let mut columns = Vec::new();
        flatten_fields(fields, "", false, &mut columns)?;
        Self::from_columns(columns)
    }

    /// All columns in order
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when there are no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column by name
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get column index by name
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Column names in order
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Flat fields, one per column
    pub fn to_fields(&self) -> Vec<Field> {
        self.columns
            .iter()
            .map(|c| Field::new(c.name.clone(), c.data_type).mode(c.mode))
            .collect()
    }
}

fn flatten_fields(
    fields: &[Field],
    prefix: &str,
    repeated_parent: bool,
    out: &mut Vec<ColumnDef>,
) -> CatalogResult<()> {
    for field in fields {
        let name = format!("{}{}", prefix, field.name);
        if field.name.is_empty() {
            return Err(CatalogError::InvalidSchema("empty field name".to_string()));
        }
        if field.data_type == DataType::Record {
            if field.fields.is_empty() {
                return Err(CatalogError::InvalidSchema(format!(
                    "record '{}' has no fields",
                    name
                )));
            }
            flatten_fields(
                &field.fields,
                &format!("{}.", name),
                repeated_parent || field.mode == Mode::Repeated,
                out,
            )?;
        } else {
            if !field.fields.is_empty() {
                return Err(CatalogError::InvalidSchema(format!(
                    "non-record field '{}' has sub-fields",
                    name
                )));
            }
            let mode = if repeated_parent {
                Mode::Repeated
            } else {
                field.mode
            };
            out.push(ColumnDef::new(name, field.data_type).mode(mode));
        }
    }
    Ok(())
}

/// Catalog error
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    /// Table or view already exists
    TableExists(String),
    /// Table or view not found
    NotFound(String),
    /// Invalid schema definition
    InvalidSchema(String),
    /// Raw row could not be coerced to the table schema
    SchemaMismatch {
        table: String,
        row: usize,
        column: Option<String>,
        reason: String,
    },
    /// WRITE_EMPTY target already holds rows
    TableNotEmpty(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::TableExists(name) => write!(f, "Table '{}' already exists", name),
            CatalogError::NotFound(name) => write!(f, "Table '{}' not found", name),
            CatalogError::InvalidSchema(msg) => write!(f, "Invalid schema: {}", msg),
            CatalogError::SchemaMismatch {
                table,
                row,
                column,
                reason,
            } => match column {
                Some(col) => write!(
                    f,
                    "Schema mismatch loading '{}' row {} column '{}': {}",
                    table, row, col, reason
                ),
                None => write!(
                    f,
                    "Schema mismatch loading '{}' row {}: {}",
                    table, row, reason
                ),
            },
            CatalogError::TableNotEmpty(name) => {
                write!(f, "Table '{}' is not empty (WRITE_EMPTY)", name)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog shared between threads; readers run queries, writers mutate tables
pub type SharedCatalog = Arc<RwLock<Catalog>>;

/// Registry of named tables and views
#[derive(Debug, Default)]
pub struct Catalog {
    /// Tables by name
    tables: HashMap<String, Table>,
    /// Views by name
    views: HashMap<String, View>,
    /// Evaluation settings applied to every query
    config: EngineConfig,
}

impl Catalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty catalog with the given engine configuration
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Wrap into a lock for concurrent use
    pub fn into_shared(self) -> SharedCatalog {
        Arc::new(RwLock::new(self))
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the engine configuration
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    /// Create an empty table
    pub fn create_table(
        &mut self,
        name: impl Into<String>,
        fields: &[Field],
    ) -> CatalogResult<&Table> {
        let name = name.into();
        if self.exists(&name) {
            return Err(CatalogError::TableExists(name));
        }
        let table = Table::new(name.clone(), fields.to_vec())?;
        tracing::info!(table = %name, columns = table.schema().len(), "Created table");
        Ok(self.tables.entry(name).or_insert(table))
    }

    /// Create an empty table from a flat schema
    pub fn create_table_with_schema(
        &mut self,
        name: impl Into<String>,
        schema: &Schema,
    ) -> CatalogResult<&Table> {
        self.create_table(name, &schema.to_fields())
    }

    /// Drop a table or view
    pub fn delete_table(&mut self, name: &str) -> CatalogResult<()> {
        if self.tables.remove(name).is_none() && self.views.remove(name).is_none() {
            return Err(CatalogError::NotFound(name.to_string()));
        }
        tracing::info!(table = %name, "Deleted table");
        Ok(())
    }

    /// Get a table
    pub fn get_table(&self, name: &str) -> CatalogResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    /// Get a view
    pub fn get_view(&self, name: &str) -> Option<&View> {
        self.views.get(name)
    }

    /// Check if a table or view exists
    pub fn exists(&self, name: &str) -> bool {
        self.tables.contains_key(name) || self.views.contains_key(name)
    }

    /// Sorted names of all tables and views
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tables
            .keys()
            .chain(self.views.keys())
            .map(|s| s.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Append raw rows, coercing each value to the column's type and mode
    ///
    /// Rows are JSON arrays (positional) or objects (keyed by field name).
    /// Loading is all-or-nothing: on error the table is left unchanged.
    pub fn load_rows(&mut self, name: &str, rows: &[serde_json::Value]) -> CatalogResult<usize> {
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        let coerced = load::coerce_rows(table, rows)?;
        let count = coerced.len();
        table.append_rows(coerced);
        tracing::info!(table = %name, rows = count, total = table.num_rows(), "Loaded rows");
        Ok(count)
    }

    /// Append rows from newline-delimited JSON text
    pub fn load_ndjson(&mut self, name: &str, text: &str) -> CatalogResult<usize> {
        let rows = load::parse_ndjson(name, text)?;
        self.load_rows(name, &rows)
    }

    /// Append already-typed rows, checking each value against the schema
    pub fn append_values(&mut self, name: &str, rows: Vec<Vec<Value>>) -> CatalogResult<usize> {
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        let checked = load::check_values(table, rows)?;
        let count = checked.len();
        table.append_rows(checked);
        tracing::info!(table = %name, rows = count, total = table.num_rows(), "Appended rows");
        Ok(count)
    }

    /// Register a view after checking that its query resolves
    pub fn create_view(&mut self, name: impl Into<String>, query: impl Into<String>) -> crate::Result<()> {
        let name = name.into();
        let query = query.into();
        if self.exists(&name) {
            return Err(CatalogError::TableExists(name).into());
        }
        let ast = crate::sql::parse(&query)?;
        crate::sql::Resolver::new(self).resolve_select(&ast)?;
        tracing::info!(view = %name, "Created view");
        self.views.insert(name.clone(), View::new(name, query));
        Ok(())
    }

    /// Run a query against this catalog
    pub fn run_query(&self, sql: &str) -> crate::Result<ResultTable> {
        crate::run_query(sql, self)
    }

    /// Copy all rows of `src` into `dest`
    pub fn copy_table(
        &mut self,
        src: &str,
        dest: &str,
        create: CreateDisposition,
        write: WriteDisposition,
    ) -> CatalogResult<usize> {
        let source = self.get_table(src)?;
        let schema = source.schema().clone();
        let rows: Vec<Vec<Value>> = source.rows().collect();
        self.write_rows(dest, &schema, rows, create, write)
    }

    /// Save a query result as a table
    pub fn store_result(
        &mut self,
        result: &ResultTable,
        dest: &str,
        create: CreateDisposition,
        write: WriteDisposition,
    ) -> CatalogResult<usize> {
        let schema = result.schema().clone();
        self.write_rows(dest, &schema, result.rows().to_vec(), create, write)
    }

    fn write_rows(
        &mut self,
        dest: &str,
        schema: &Schema,
        rows: Vec<Vec<Value>>,
        create: CreateDisposition,
        write: WriteDisposition,
    ) -> CatalogResult<usize> {
        if !self.tables.contains_key(dest) {
            if create == CreateDisposition::CreateNever {
                return Err(CatalogError::NotFound(dest.to_string()));
            }
            let fields: Vec<Field> = schema
                .columns()
                .iter()
                .map(|c| {
                    let data_type = match c.data_type {
                        DataType::Null => DataType::String,
                        t => t,
                    };
                    // Copied tables accept NULLs regardless of the source mode
                    let mode = match c.mode {
                        Mode::Repeated => Mode::Repeated,
                        _ => Mode::Nullable,
                    };
                    Field::new(c.name.clone(), data_type).mode(mode)
                })
                .collect();
            self.create_table(dest, &fields)?;
        }

        let table = self
            .tables
            .get_mut(dest)
            .ok_or_else(|| CatalogError::NotFound(dest.to_string()))?;
        if table.num_rows() > 0 {
            match write {
                WriteDisposition::WriteEmpty => {
                    return Err(CatalogError::TableNotEmpty(dest.to_string()))
                }
                WriteDisposition::WriteTruncate => table.clear(),
                WriteDisposition::WriteAppend => {}
            }
        }

        let aligned = load::align_by_name(table, schema, rows)?;
        let checked = load::check_values(table, aligned)?;
        let count = checked.len();
        table.append_rows(checked);
        tracing::info!(table = %dest, rows = count, "Wrote rows");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> Vec<Field> {
        vec![
            Field::new("id", DataType::Integer).required(),
            Field::new("name", DataType::String),
        ]
    }

    #[test]
    fn test_create_and_get_table() {
        let mut catalog = Catalog::new();
        catalog.create_table("users", &users()).unwrap();

        let table = catalog.get_table("users").unwrap();
        assert_eq!(table.schema().names(), vec!["id", "name"]);
        assert_eq!(table.num_rows(), 0);
    }

    #[test]
    fn test_create_duplicate_table() {
        let mut catalog = Catalog::new();
        catalog.create_table("users", &users()).unwrap();
        let result = catalog.create_table("users", &users());
        assert!(matches!(result, Err(CatalogError::TableExists(_))));
    }

    #[test]
    fn test_delete_table() {
        let mut catalog = Catalog::new();
        catalog.create_table("users", &users()).unwrap();
        catalog.delete_table("users").unwrap();
        assert!(matches!(
            catalog.get_table("users"),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            catalog.delete_table("users"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_record_fields_flatten() {
        let fields = vec![
            Field::new("id", DataType::Integer),
            Field::record(
                "addr",
                vec![
                    Field::new("city", DataType::String),
                    Field::new("zip", DataType::String).required(),
                ],
            )
            .repeated(),
        ];
        let schema = Schema::from_fields(&fields).unwrap();
        assert_eq!(schema.names(), vec!["id", "addr.city", "addr.zip"]);
        assert_eq!(schema.get_column("addr.zip").unwrap().mode, Mode::Repeated);
    }

    #[test]
    fn test_duplicate_flattened_names_rejected() {
        let fields = vec![
            Field::new("a.b", DataType::Integer),
            Field::record("a", vec![Field::new("b", DataType::Integer)]),
        ];
        assert!(matches!(
            Schema::from_fields(&fields),
            Err(CatalogError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_load_rows_is_atomic() {
        let mut catalog = Catalog::new();
        catalog.create_table("users", &users()).unwrap();

        let result = catalog.load_rows("users", &[json!([1, "a"]), json!([null, "b"])]);
        assert!(matches!(
            result,
            Err(CatalogError::SchemaMismatch { row: 1, .. })
        ));
        assert_eq!(catalog.get_table("users").unwrap().num_rows(), 0);
    }

    #[test]
    fn test_copy_table_dispositions() {
        let mut catalog = Catalog::new();
        catalog.create_table("users", &users()).unwrap();
        catalog.load_rows("users", &[json!([1, "a"])]).unwrap();

        let missing = catalog.copy_table(
            "users",
            "copy",
            CreateDisposition::CreateNever,
            WriteDisposition::WriteAppend,
        );
        assert!(matches!(missing, Err(CatalogError::NotFound(_))));

        catalog
            .copy_table(
                "users",
                "copy",
                CreateDisposition::CreateIfNeeded,
                WriteDisposition::WriteAppend,
            )
            .unwrap();
        catalog
            .copy_table(
                "users",
                "copy",
                CreateDisposition::CreateIfNeeded,
                WriteDisposition::WriteAppend,
            )
            .unwrap();
        assert_eq!(catalog.get_table("copy").unwrap().num_rows(), 2);

        let not_empty = catalog.copy_table(
            "users",
            "copy",
            CreateDisposition::CreateIfNeeded,
            WriteDisposition::WriteEmpty,
        );
        assert!(matches!(not_empty, Err(CatalogError::TableNotEmpty(_))));

        catalog
            .copy_table(
                "users",
                "copy",
                CreateDisposition::CreateIfNeeded,
                WriteDisposition::WriteTruncate,
            )
            .unwrap();
        assert_eq!(catalog.get_table("copy").unwrap().num_rows(), 1);
    }

    #[test]
    fn test_table_names_sorted() {
        let mut catalog = Catalog::new();
        catalog.create_table("b", &users()).unwrap();
        catalog.create_table("a", &users()).unwrap();
        assert_eq!(catalog.table_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_type_and_mode() {
        assert_eq!("int64".parse::<DataType>().unwrap(), DataType::Integer);
        assert_eq!("Bool".parse::<DataType>().unwrap(), DataType::Boolean);
        assert!("blob".parse::<DataType>().is_err());
        assert_eq!("repeated".parse::<Mode>().unwrap(), Mode::Repeated);
    }
}
