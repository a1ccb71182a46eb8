//! Merge finalized tiles by concatenating layer dictionaries and features.

use crate::vector_tile::{Tile, tile};
use log::debug;

/// Push everything from `layer2` into `layer`, rewriting the appended
/// features' tag indices by the dictionary offsets.
///
/// Dictionaries are concatenated, not deduplicated, so repeated merges of
/// the same streams grow them linearly.
pub(crate) fn combine_layers(mut layer: tile::Layer, mut layer2: tile::Layer) -> tile::Layer {
    let key_offset = layer.keys.len() as u32;
    let value_offset = layer.values.len() as u32;
    debug!(
        "combining layer `{}`: {}+{} features, {}+{} keys, {}+{} values",
        layer.name,
        layer.features.len(),
        layer2.features.len(),
        key_offset,
        layer2.keys.len(),
        value_offset,
        layer2.values.len(),
    );

    if layer.keys.is_empty() {
        layer.keys = std::mem::take(&mut layer2.keys);
    } else {
        layer.keys.append(&mut layer2.keys);
    }
    if layer.values.is_empty() {
        layer.values = std::mem::take(&mut layer2.values);
    } else {
        layer.values.append(&mut layer2.values);
    }

    if layer.features.is_empty() && key_offset == 0 && value_offset == 0 {
        layer.features = std::mem::take(&mut layer2.features);
    } else {
        layer.features.reserve(layer2.features.len());
        for mut feature in layer2.features {
            for pair in feature.tags.chunks_mut(2) {
                pair[0] += key_offset;
                if let Some(value_id) = pair.get_mut(1) {
                    *value_id += value_offset;
                }
            }
            layer.features.push(feature);
        }
    }
    layer
}

/// Merge two tiles: layers sharing a name are combined, all others are
/// carried over unchanged, one layer per distinct name.
pub(crate) fn combine_tiles(tile1: Tile, tile2: Tile) -> Tile {
    if tile1.layers.is_empty() {
        return tile2;
    }
    if tile2.layers.is_empty() {
        return tile1;
    }

    let mut pending: Vec<Option<tile::Layer>> = tile2.layers.into_iter().map(Some).collect();
    let mut layers = Vec::with_capacity(tile1.layers.len() + pending.len());
    for layer in tile1.layers {
        let matched = pending
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|other| other.name == layer.name))
            .and_then(Option::take);
        match matched {
            Some(layer2) => layers.push(combine_layers(layer, layer2)),
            None => layers.push(layer),
        }
    }
    layers.extend(pending.into_iter().flatten());
    Tile { layers }
}
