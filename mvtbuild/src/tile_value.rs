//! Typed property values, as stored in the layer value dictionary.

use crate::vector_tile::tile;
use std::hash::Hash;

/// A wrapper for the MVT value types used by this encoder.
///
/// `int_value` is never produced: non-negative integers are routed to
/// [`TileValue::Uint`] and negative ones to [`TileValue::Sint`], so `5`
/// and `-5` occupy different dictionary slots.
#[derive(Debug, Clone)]
pub enum TileValue {
    Str(String),
    Float(f32),
    Double(f64),
    Uint(u64),
    Sint(i64),
    Bool(bool),
}

impl TileValue {
    /// Route a signed integer by its sign.
    pub fn from_int(value: i64) -> Self {
        if value >= 0 {
            TileValue::Uint(value as u64)
        } else {
            TileValue::Sint(value)
        }
    }
}

impl From<TileValue> for tile::Value {
    fn from(tv: TileValue) -> Self {
        match tv {
            TileValue::Str(s) => Self {
                string_value: Some(s),
                ..Default::default()
            },
            TileValue::Float(f) => Self {
                float_value: Some(f),
                ..Default::default()
            },
            TileValue::Double(d) => Self {
                double_value: Some(d),
                ..Default::default()
            },
            TileValue::Uint(u) => Self {
                uint_value: Some(u),
                ..Default::default()
            },
            TileValue::Sint(i) => Self {
                sint_value: Some(i),
                ..Default::default()
            },
            TileValue::Bool(b) => Self {
                bool_value: Some(b),
                ..Default::default()
            },
        }
    }
}

// Floats are compared and hashed by their bit patterns, so equal payloads
// of the same variant always deduplicate to the same dictionary id and
// `0.0` / `-0.0` stay distinct.

impl PartialEq for TileValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Uint(a), Self::Uint(b)) => a == b,
            (Self::Sint(a), Self::Sint(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TileValue {}

impl Hash for TileValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Str(s) => s.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Double(d) => d.to_bits().hash(state),
            Self::Uint(u) => u.hash(state),
            Self::Sint(i) => i.hash(state),
            Self::Bool(b) => b.hash(state),
        }
    }
}
