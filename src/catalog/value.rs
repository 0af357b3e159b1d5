//! Value type - tagged runtime values stored in tables and produced by queries

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::DataType;

/// A single cell value
///
/// Cells of REPEATED columns hold an `Array` of element values; every other
/// cell holds exactly one scalar variant or `Null`.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// NULL value
    #[default]
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// Double precision float
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Timestamp as microseconds since the unix epoch (UTC)
    Timestamp(i64),
    /// Elements of a REPEATED cell
    Array(Vec<Value>),
}

impl Value {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric tag used to order values of different variants
    fn type_tag(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
            Value::Timestamp(_) => 5,
            Value::Array(_) => 6,
        }
    }

    /// Get the data type of this value (`Null` for NULL)
    ///
    /// Arrays report the type of their first non-NULL element.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Boolean(_) => DataType::Boolean,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::String(_) => DataType::String,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Array(items) => items
                .iter()
                .map(Value::data_type)
                .find(|t| *t != DataType::Null)
                .unwrap_or(DataType::Null),
        }
    }

    /// Get the boolean payload, None if NULL or not a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the integer payload, None if NULL or not an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value as f64 (integers are widened)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get a string reference, None if NULL or not a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the timestamp payload in microseconds
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Get the elements of a REPEATED cell
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Convert to a JSON value (timestamps render as text)
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(t) => serde_json::Value::String(format_timestamp(*t)),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => normalize_float(*a).to_bits() == normalize_float(*b).to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // NULLs sort first (smallest)
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,

            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => normalize_float(*a).total_cmp(&normalize_float(*b)),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),

            // Different variants: type tag keeps the order total
            _ => self.type_tag().cmp(&other.type_tag()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => normalize_float(*f).to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Timestamp(t) => t.hash(state),
            Value::Array(items) => items.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Timestamp(t) => write!(f, "{}", format_timestamp(*t)),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Key form of a float for grouping and sorting
///
/// `-0.0` folds into `0.0` and every NaN into one NaN, so `Eq`, `Hash` and
/// `Ord` agree on which floats are the same group.
pub fn normalize_float(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else if f.is_nan() {
        f64::NAN
    } else {
        f
    }
}

/// Convert microseconds since the epoch to a UTC datetime
pub fn timestamp_to_datetime(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros)
}

/// Render a timestamp the way query results display it
pub fn format_timestamp(micros: i64) -> String {
    match timestamp_to_datetime(micros) {
        Some(dt) => {
            if dt.timestamp_subsec_micros() == 0 {
                dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
            } else {
                dt.format("%Y-%m-%d %H:%M:%S%.6f UTC").to_string()
            }
        }
        None => format!("{}us", micros),
    }
}

/// Parse an ISO-8601 style timestamp string into epoch microseconds
///
/// Accepts RFC 3339 (`2016-01-01T12:00:00Z`, offsets), `YYYY-MM-DD HH:MM:SS[.ffffff]`
/// with an optional `UTC` suffix, and bare dates.
pub fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc).timestamp_micros());
    }
    let naive = text
        .strip_suffix("UTC")
        .or_else(|| text.strip_suffix('Z'))
        .unwrap_or(text)
        .trim_end();
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(dt.and_utc().timestamp_micros());
        }
    }
    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_micros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_null() {
        let v = Value::Null;
        assert!(v.is_null());
        assert_eq!(v.data_type(), DataType::Null);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Boolean(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_int(), Some(42));
        assert_eq!(Value::Integer(42).as_float(), Some(42.0));
        assert_eq!(Value::Float(2.5).as_int(), None);
        assert_eq!(Value::from("hello").as_str(), Some("hello"));
    }

    #[test]
    fn test_value_ordering_null_first() {
        assert!(Value::Null < Value::Integer(i64::MIN));
        assert!(Value::Integer(1) < Value::Integer(2));
        assert!(Value::from("a") < Value::from("b"));
    }

    #[test]
    fn test_value_float_key_equality() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of(v: &Value) -> u64 {
            let mut hasher = DefaultHasher::new();
            v.hash(&mut hasher);
            hasher.finish()
        }

        assert_eq!(Value::Float(1.0), Value::Float(1.0));
        assert_ne!(Value::Integer(1), Value::Float(1.0));

        let zero = Value::Float(0.0);
        let neg_zero = Value::Float(-0.0);
        assert_eq!(zero, neg_zero);
        assert_eq!(zero.cmp(&neg_zero), Ordering::Equal);
        assert_eq!(hash_of(&zero), hash_of(&neg_zero));

        let nan = Value::Float(f64::NAN);
        assert_eq!(nan, Value::Float(-f64::NAN));
        assert_eq!(hash_of(&nan), hash_of(&Value::Float(-f64::NAN)));
    }

    #[test]
    fn test_array_data_type_skips_nulls() {
        let v = Value::Array(vec![Value::Null, Value::Integer(3)]);
        assert_eq!(v.data_type(), DataType::Integer);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = 1_451_649_600_000_000; // 2016-01-01 12:00:00 UTC
        assert_eq!(parse_timestamp("2016-01-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2016-01-01 12:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2016-01-01 12:00:00 UTC"), Some(expected));
        assert_eq!(
            parse_timestamp("2016-01-01T13:00:00+01:00"),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp("2016-01-01"),
            Some(expected - 12 * 3_600_000_000)
        );
        assert_eq!(parse_timestamp("not a time"), None);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_timestamp(1_500_000), "1970-01-01 00:00:01.500000 UTC");
    }

    #[test]
    fn test_to_json() {
        assert_eq!(Value::Integer(3).to_json(), serde_json::json!(3));
        assert_eq!(
            Value::Array(vec![Value::from("a"), Value::Null]).to_json(),
            serde_json::json!(["a", null])
        );
    }
}
