//! Event record types and typed field extraction
//!
//! Records are parsed from the JSON produced by the intake wire-to-json
//! helper: an array of objects with `name`, `timestamp` (nanoseconds) and a
//! nested `data` object holding the message-specific members. The `rpc_id`
//! and `ref` keys are ignored.

use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// One named, timestamped entry in a recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Message name, selects the write operation
    pub name: String,

    /// Capture time in nanoseconds
    pub timestamp: u64,

    /// Message-specific fields
    pub fields: Fields,
}

impl EventRecord {
    /// Create a record from already-typed fields
    pub fn new(name: impl Into<String>, timestamp: u64, fields: Fields) -> Self {
        Self {
            name: name.into(),
            timestamp,
            fields,
        }
    }

    /// Build a record from a recording entry.
    ///
    /// Only the envelope is checked here; the contents of `data` are kept as
    /// loosely typed values and validated by whichever handler consumes them.
    pub(crate) fn from_json(value: &Value) -> std::result::Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| format!("expected an object, found {}", json_kind(value)))?;

        let name = match object.get("name") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(format!("`name` must be a string, found {}", json_kind(other)));
            }
            None => return Err("missing `name`".to_string()),
        };

        let timestamp = match object.get("timestamp") {
            Some(ts) => ts
                .as_u64()
                .ok_or_else(|| format!("`timestamp` must be an unsigned integer, found {}", ts))?,
            None => return Err("missing `timestamp`".to_string()),
        };

        let fields = match object.get("data") {
            Some(Value::Object(data)) => data
                .iter()
                .map(|(key, value)| (key.clone(), FieldValue::from_json(value)))
                .collect(),
            Some(Value::Null) | None => BTreeMap::new(),
            Some(other) => {
                return Err(format!("`data` must be an object, found {}", json_kind(other)));
            }
        };

        Ok(Self {
            name,
            timestamp,
            fields: Fields(fields),
        })
    }
}

/// A loosely typed field value as found in the recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Non-negative integer
    Unsigned(u64),
    /// Negative integer
    Signed(i64),
    /// UTF-8 string
    Text(String),
    /// Opaque bytes (a JSON array of 0..=255 integers)
    Blob(Vec<u8>),
    /// Anything else; extraction always fails with the recorded kind
    Unsupported(&'static str),
}

impl FieldValue {
    /// Classify a JSON value
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    FieldValue::Unsigned(u)
                } else if let Some(i) = n.as_i64() {
                    FieldValue::Signed(i)
                } else {
                    FieldValue::Unsupported("float")
                }
            }
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .map(FieldValue::Blob)
                .unwrap_or(FieldValue::Unsupported("array")),
            other => FieldValue::Unsupported(json_kind(other)),
        }
    }

    /// Short type name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Unsigned(_) => "unsigned integer",
            FieldValue::Signed(_) => "signed integer",
            FieldValue::Text(_) => "string",
            FieldValue::Blob(_) => "byte array",
            FieldValue::Unsupported(kind) => kind,
        }
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Unsigned(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        if v >= 0 {
            FieldValue::Unsigned(v as u64)
        } else {
            FieldValue::Signed(v)
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Blob(v)
    }
}

/// Per-record extraction failure. Never aborts a replay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("missing field `{field}`")]
    Missing { field: String },

    #[error("field `{field}` expected {expected}, found {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field `{field}` value {value} does not fit in {expected}")]
    OutOfRange {
        field: String,
        expected: &'static str,
        value: i128,
    },
}

/// The field set of one record, with typed accessors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, FieldValue>);

macro_rules! integer_accessor {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&self, field: &str) -> Result<$ty, FieldError> {
            let wide: i128 = match self.get(field)? {
                FieldValue::Unsigned(v) => i128::from(*v),
                FieldValue::Signed(v) => i128::from(*v),
                other => {
                    return Err(FieldError::WrongType {
                        field: field.to_string(),
                        expected: stringify!($ty),
                        found: other.kind(),
                    })
                }
            };
            <$ty>::try_from(wide).map_err(|_| FieldError::OutOfRange {
                field: field.to_string(),
                expected: stringify!($ty),
                value: wide,
            })
        }
    };
}

impl Fields {
    /// Empty field set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and synthetic recordings
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Remove a field, returning its previous value
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.0.remove(key)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Raw access to a field
    pub fn get(&self, field: &str) -> Result<&FieldValue, FieldError> {
        self.0.get(field).ok_or_else(|| FieldError::Missing {
            field: field.to_string(),
        })
    }

    integer_accessor!(
        /// Unsigned 8-bit field
        u8, u8
    );
    integer_accessor!(
        /// Unsigned 16-bit field
        u16, u16
    );
    integer_accessor!(
        /// Unsigned 32-bit field
        u32, u32
    );
    integer_accessor!(
        /// Unsigned 64-bit field
        u64, u64
    );
    integer_accessor!(
        /// Signed 32-bit field
        i32, i32
    );

    /// String field; byte arrays are decoded as lossy UTF-8
    pub fn text(&self, field: &str) -> Result<Cow<'_, str>, FieldError> {
        match self.get(field)? {
            FieldValue::Text(s) => Ok(Cow::Borrowed(s)),
            FieldValue::Blob(b) => Ok(String::from_utf8_lossy(b)),
            other => Err(FieldError::WrongType {
                field: field.to_string(),
                expected: "string or byte array",
                found: other.kind(),
            }),
        }
    }

    /// Variable-length blob; strings contribute their UTF-8 bytes
    pub fn blob(&self, field: &str) -> Result<Vec<u8>, FieldError> {
        match self.get(field)? {
            FieldValue::Text(s) => Ok(s.as_bytes().to_vec()),
            FieldValue::Blob(b) => Ok(b.clone()),
            other => Err(FieldError::WrongType {
                field: field.to_string(),
                expected: "string or byte array",
                found: other.kind(),
            }),
        }
    }

    /// Fixed-width byte field: copied, truncated to `N`, zero-padded
    pub fn fixed<const N: usize>(&self, field: &str) -> Result<[u8; N], FieldError> {
        Ok(fixed_bytes(&self.blob(field)?))
    }
}

impl FromIterator<(String, FieldValue)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Fields(iter.into_iter().collect())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Unsigned(v) => write!(f, "{}", v),
            FieldValue::Signed(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{:?}", s),
            FieldValue::Blob(b) => write!(f, "{:?}", b),
            FieldValue::Unsupported(kind) => write!(f, "<{}>", kind),
        }
    }
}

/// Copy `src` into a zeroed `N`-byte array, truncating if needed
pub fn fixed_bytes<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let len = src.len().min(N);
    out[..len].copy_from_slice(&src[..len]);
    out
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
