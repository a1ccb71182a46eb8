//! Per-layer dictionaries of unique keys and typed values.

use crate::tile_value::TileValue;
use crate::vector_tile::tile;
use std::collections::HashMap;

/// Assigns dense ids to unique tag keys and values of one layer.
///
/// Key ids and value ids are independent sequences, but all value variants
/// share a single counter, so the frozen value dictionary is one flat
/// vector indexed by value id.
#[derive(Debug, Default)]
pub struct PropertyInterner {
    keys: HashMap<String, u32>,
    values: HashMap<TileValue, u32>,
}

impl PropertyInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, interning a fresh copy on first sight.
    pub fn intern_key(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.keys.get(name) {
            return id;
        }
        let id = self.keys.len() as u32;
        self.keys.insert(name.to_string(), id);
        id
    }

    /// Id for `value`. An already-known value is dropped here; a novel one
    /// is retained until [`PropertyInterner::freeze_values`].
    pub fn intern_value(&mut self, value: TileValue) -> u32 {
        if let Some(&id) = self.values.get(&value) {
            return id;
        }
        let id = self.values.len() as u32;
        self.values.insert(value, id);
        id
    }

    /// The flat key dictionary, indexed by key id. Clears the lookup map.
    pub fn freeze_keys(&mut self) -> Vec<String> {
        let mut keys = vec![String::new(); self.keys.len()];
        for (name, id) in self.keys.drain() {
            keys[id as usize] = name;
        }
        keys
    }

    /// The flat value dictionary, indexed by value id. Clears the lookup map.
    pub fn freeze_values(&mut self) -> Vec<tile::Value> {
        let mut values = vec![tile::Value::default(); self.values.len()];
        for (value, id) in self.values.drain() {
            values[id as usize] = value.into();
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_deduplicate() {
        let mut interner = PropertyInterner::new();
        let a = interner.intern_key("name");
        let b = interner.intern_key("population");
        assert_eq!(interner.intern_key("name"), a);
        assert_eq!((a, b), (0, 1));
        assert_eq!(interner.freeze_keys(), ["name", "population"]);
    }

    #[test]
    fn values_share_one_id_counter() {
        let mut interner = PropertyInterner::new();
        let s = interner.intern_value(TileValue::Str("Paris".to_string()));
        let u = interner.intern_value(TileValue::Uint(2_000_000));
        let b = interner.intern_value(TileValue::Bool(true));
        assert_eq!((s, u, b), (0, 1, 2));
        assert_eq!(interner.intern_value(TileValue::Str("Paris".to_string())), s);

        let values = interner.freeze_values();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].string_value.as_deref(), Some("Paris"));
        assert_eq!(values[1].uint_value, Some(2_000_000));
        assert_eq!(values[2].bool_value, Some(true));
    }

    #[test]
    fn same_magnitude_different_sign_gets_two_slots() {
        let mut interner = PropertyInterner::new();
        let pos = interner.intern_value(TileValue::from_int(5));
        let neg = interner.intern_value(TileValue::from_int(-5));
        assert_ne!(pos, neg);

        let values = interner.freeze_values();
        assert_eq!(values[pos as usize].uint_value, Some(5));
        assert_eq!(values[neg as usize].sint_value, Some(-5));
    }

    #[test]
    fn freezing_scatters_by_insertion_order() {
        let mut interner = PropertyInterner::new();
        for i in 0..100i64 {
            interner.intern_value(TileValue::from_int(i));
        }
        let values = interner.freeze_values();
        for (i, value) in values.iter().enumerate() {
            assert_eq!(value.uint_value, Some(i as u64));
        }
        // Frozen interner hands out fresh ids again.
        assert_eq!(interner.intern_value(TileValue::Bool(false)), 0);
    }
}
