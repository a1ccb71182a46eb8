//! Host-facing row access: schema description and per-row values.

use crate::error::Result;
use geo_types::Geometry;
use std::fmt;

/// Declared type of a row column, used to resolve the column layout on
/// the first row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Geometry,
    Bool,
    /// 16 bit signed integer.
    Short,
    /// 32 bit signed integer.
    Int,
    /// 64 bit signed integer.
    Long,
    Float,
    Double,
    String,
    /// A JSON document; object keys become tags lazily, per row.
    Json,
    /// Anything else; rendered to text by the host.
    Other,
}

/// One column of the row schema.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub ctype: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ctype: ColumnType) -> Self {
        Column {
            name: name.into(),
            ctype,
        }
    }
}

/// The shape shared by every row of one aggregation.
#[derive(Debug, Clone, Default)]
pub struct RowSchema {
    columns: Vec<Column>,
}

impl RowSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        RowSchema { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A non-null attribute value.
///
/// Variants correspond to the column types the encoder handles natively;
/// [`ColumnValue::DateTime`] and [`ColumnValue::Other`] carry text already
/// rendered by the host's type output machinery and are stored as strings.
#[derive(PartialEq, Debug)]
pub enum ColumnValue<'a> {
    Bool(bool),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(&'a str),
    Json(&'a str),
    DateTime(&'a str),
    Other(&'a str),
}

impl fmt::Display for ColumnValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Bool(v) => write!(f, "{v}"),
            ColumnValue::Short(v) => write!(f, "{v}"),
            ColumnValue::Int(v) => write!(f, "{v}"),
            ColumnValue::Long(v) => write!(f, "{v}"),
            ColumnValue::Float(v) => write!(f, "{v}"),
            ColumnValue::Double(v) => write!(f, "{v}"),
            ColumnValue::String(v) => write!(f, "{v}"),
            ColumnValue::Json(v) => write!(f, "{v}"),
            ColumnValue::DateTime(v) => write!(f, "{v}"),
            ColumnValue::Other(v) => write!(f, "{v}"),
        }
    }
}

/// One input row: a geometry paired with attribute values.
///
/// Implemented by the host over its native tuple representation; the
/// aggregation driver only ever reads through this trait.
pub trait FeatureRow {
    /// The row shape. Resolved into a column layout on the first row and
    /// assumed stable for the whole aggregation.
    fn schema(&self) -> &RowSchema;

    /// Deserialized geometry of column `idx`, or `None` when NULL.
    fn geometry(&self, idx: usize) -> Result<Option<Geometry<f64>>>;

    /// Value of column `idx`, or `None` when NULL.
    fn value(&self, idx: usize) -> Result<Option<ColumnValue<'_>>>;
}
