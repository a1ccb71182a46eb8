//! The aggregation context: rows in, packed tile bytes out.

use crate::combine::combine_tiles;
use crate::error::{MvtBuildError, Result};
use crate::feature::{FeatureBuilder, encode_geometry};
use crate::interner::PropertyInterner;
use crate::prepare::{GeomTransform, prepare_geometry};
use crate::row::{ColumnType, ColumnValue, FeatureRow, RowSchema};
use crate::tile_value::TileValue;
use crate::vector_tile::{Tile, tile};
use log::{debug, trace};
use prost::Message;

const FEATURES_CAPACITY_INITIAL: usize = 50;

/// Configuration of one aggregation.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Name of the produced layer.
    pub layer_name: String,
    /// Tile coordinate range, commonly 4096. Must not be zero.
    pub extent: u32,
    /// Geometry column name; defaults to the first geometry-typed column.
    pub geometry_column: Option<String>,
    /// Feature id column name; must be of signed integer type when set.
    pub id_column: Option<String>,
    /// When set, row geometries are world coordinates and run through the
    /// tile-space pipeline; otherwise they are taken as already prepared.
    pub transform: Option<GeomTransform>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        AggregateOptions {
            layer_name: "default".to_string(),
            extent: 4096,
            geometry_column: None,
            id_column: None,
            transform: None,
        }
    }
}

impl AggregateOptions {
    pub fn new(layer_name: impl Into<String>) -> Self {
        AggregateOptions {
            layer_name: layer_name.into(),
            ..Default::default()
        }
    }
}

/// What a column contributes to each feature, resolved once from the
/// schema of the first row.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnRole {
    Geometry,
    FeatureId,
    /// Keys of JSON documents are interned lazily, per row.
    Json,
    Tag(u32),
}

#[derive(Debug)]
struct ColumnCache {
    roles: Vec<ColumnRole>,
    geom_index: usize,
}

struct LayerBuilder {
    name: String,
    extent: u32,
    interner: PropertyInterner,
    features: Vec<tile::Feature>,
}

impl LayerBuilder {
    fn new(name: &str, extent: u32) -> Self {
        LayerBuilder {
            name: name.to_string(),
            extent,
            interner: PropertyInterner::new(),
            features: Vec::with_capacity(FEATURES_CAPACITY_INITIAL),
        }
    }

    fn freeze(mut self) -> tile::Layer {
        tile::Layer {
            version: 2,
            name: self.name,
            features: self.features,
            keys: self.interner.freeze_keys(),
            values: self.interner.freeze_values(),
            extent: Some(self.extent),
        }
    }
}

/// Builds one MVT layer incrementally from rows, finalizes it into the
/// packed tile encoding, and merges finalized tiles.
///
/// The aggregation protocol mirrors a database aggregate: feed rows with
/// [`TileAggregate::push_row`], produce the tile bytes with
/// [`TileAggregate::to_bytes`]. Partial results round-trip through
/// [`TileAggregate::to_bytes`] / [`TileAggregate::from_bytes`] and merge
/// with [`TileAggregate::combine`].
pub struct TileAggregate {
    options: AggregateOptions,
    cache: Option<ColumnCache>,
    layer: Option<LayerBuilder>,
    tile: Option<Tile>,
}

impl TileAggregate {
    pub fn new(options: AggregateOptions) -> Result<Self> {
        if options.extent == 0 {
            return Err(MvtBuildError::ZeroExtent);
        }
        let layer = LayerBuilder::new(&options.layer_name, options.extent);
        Ok(TileAggregate {
            options,
            cache: None,
            layer: Some(layer),
            tile: None,
        })
    }

    /// Turn one row into a feature and append it to the layer.
    ///
    /// Rows with a NULL geometry, and rows whose geometry vanishes in the
    /// tile-space pipeline, are skipped without error.
    pub fn push_row(&mut self, row: &impl FeatureRow) -> Result<()> {
        let Some(layer) = self.layer.as_mut() else {
            return Err(MvtBuildError::AggregateFinished);
        };
        let cache = match &mut self.cache {
            Some(cache) => cache,
            cache @ None => {
                let resolved = resolve_columns(row.schema(), &self.options, &mut layer.interner)?;
                cache.insert(resolved)
            }
        };

        let Some(geom) = row.geometry(cache.geom_index)? else {
            trace!("skipping row with NULL geometry");
            return Ok(());
        };
        let geom = match &self.options.transform {
            Some(transform) => {
                match prepare_geometry(
                    geom,
                    &transform.bounds,
                    self.options.extent,
                    transform.buffer,
                    transform.clip_geom,
                ) {
                    Some(geom) => geom,
                    None => {
                        trace!("skipping row: geometry vanished in tile space");
                        return Ok(());
                    }
                }
            }
            None => geom,
        };

        let mut feature = FeatureBuilder::new();
        encode_geometry(&mut feature, &geom)?;
        drop(geom);
        if feature.geometry_is_empty() {
            trace!("skipping row: all geometry parts degenerate");
            return Ok(());
        }

        for (idx, role) in cache.roles.iter().enumerate() {
            match role {
                ColumnRole::Geometry => {}
                ColumnRole::FeatureId => {
                    let Some(value) = row.value(idx)? else {
                        continue;
                    };
                    let id = match value {
                        ColumnValue::Short(v) => i64::from(v),
                        ColumnValue::Int(v) => i64::from(v),
                        ColumnValue::Long(v) => v,
                        _ => {
                            let name = self.options.id_column.clone().unwrap_or_default();
                            return Err(MvtBuildError::IdColumnType(name));
                        }
                    };
                    if id >= 0 {
                        feature.set_id(id as u64);
                    } else {
                        trace!("ignoring negative feature id {id}");
                    }
                }
                ColumnRole::Json => {
                    if let Some(ColumnValue::Json(text)) = row.value(idx)? {
                        parse_json_document(&mut feature, &mut layer.interner, text)?;
                    }
                }
                ColumnRole::Tag(key_id) => {
                    if let Some(value) = row.value(idx)? {
                        let value_id = layer.interner.intern_value(tile_value_of(&value));
                        feature.add_property(*key_id, value_id);
                    }
                }
            }
        }

        layer.features.push(feature.build());
        Ok(())
    }

    /// Finalize into the packed tile encoding.
    ///
    /// The built tile is cached, so this also serves as the serialization
    /// of a partial aggregation; rows can no longer be pushed afterwards.
    /// A tile whose layers hold no features packs to an empty byte vector.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        if let Some(layer) = self.layer.take() {
            debug!(
                "finalizing layer `{}` with {} features",
                layer.name,
                layer.features.len()
            );
            self.tile = Some(Tile {
                layers: vec![layer.freeze()],
            });
        }
        let tile = self.tile.get_or_insert_with(Tile::default);
        if tile.layers.iter().all(|layer| layer.features.is_empty()) {
            return Ok(Vec::new());
        }
        Ok(tile.encode_to_vec())
    }

    /// Rebuild an aggregation context from packed tile bytes. Only the
    /// tile is restored, not the interner state.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let tile = Tile::decode(data)?;
        Ok(TileAggregate {
            options: AggregateOptions::default(),
            cache: None,
            layer: None,
            tile: Some(tile),
        })
    }

    /// Merge two finalized aggregations; either side being `None` yields
    /// the other. Both tiles are consumed by the result.
    pub fn combine(lhs: Option<Self>, rhs: Option<Self>) -> Result<Option<Self>> {
        match (lhs, rhs) {
            (None, None) => Ok(None),
            (Some(ctx), None) | (None, Some(ctx)) => Ok(Some(ctx)),
            (Some(lhs), Some(rhs)) => {
                let (Some(tile1), Some(tile2)) = (lhs.tile, rhs.tile) else {
                    return Err(MvtBuildError::CombineMissingTile);
                };
                Ok(Some(TileAggregate {
                    options: lhs.options,
                    cache: None,
                    layer: None,
                    tile: Some(combine_tiles(tile1, tile2)),
                }))
            }
        }
    }
}

/// Walk the first row's schema and assign every column its role. Tag
/// column names are interned up front; JSON documents contribute keys
/// only as their objects are seen.
fn resolve_columns(
    schema: &RowSchema,
    options: &AggregateOptions,
    interner: &mut PropertyInterner,
) -> Result<ColumnCache> {
    let mut roles = Vec::with_capacity(schema.len());
    let mut geom_index = None;
    let mut id_found = false;

    for (idx, column) in schema.columns().iter().enumerate() {
        if column.ctype == ColumnType::Json {
            roles.push(ColumnRole::Json);
            continue;
        }

        let is_geometry = geom_index.is_none()
            && match &options.geometry_column {
                Some(name) => column.name == *name,
                None => column.ctype == ColumnType::Geometry,
            };
        if is_geometry {
            geom_index = Some(idx);
            roles.push(ColumnRole::Geometry);
            continue;
        }

        if !id_found
            && options.id_column.as_deref() == Some(column.name.as_str())
            && matches!(
                column.ctype,
                ColumnType::Short | ColumnType::Int | ColumnType::Long
            )
        {
            id_found = true;
            roles.push(ColumnRole::FeatureId);
            continue;
        }

        roles.push(ColumnRole::Tag(interner.intern_key(&column.name)));
    }

    let geom_index = geom_index.ok_or(MvtBuildError::GeometryColumnNotFound)?;
    if let Some(id_name) = &options.id_column {
        if !id_found {
            return Err(MvtBuildError::IdColumnNotFound(id_name.clone()));
        }
    }
    debug!(
        "resolved {} columns, geometry at index {geom_index}",
        schema.len()
    );
    Ok(ColumnCache { roles, geom_index })
}

fn tile_value_of(value: &ColumnValue) -> TileValue {
    match value {
        ColumnValue::Bool(v) => TileValue::Bool(*v),
        ColumnValue::Short(v) => TileValue::from_int(i64::from(*v)),
        ColumnValue::Int(v) => TileValue::from_int(i64::from(*v)),
        ColumnValue::Long(v) => TileValue::from_int(*v),
        ColumnValue::Float(v) => TileValue::Float(*v),
        ColumnValue::Double(v) => TileValue::Double(*v),
        ColumnValue::String(v) => TileValue::Str((*v).to_string()),
        ColumnValue::Json(v) | ColumnValue::DateTime(v) | ColumnValue::Other(v) => {
            TileValue::Str((*v).to_string())
        }
    }
}

/// Intern the tags of one JSON document. Only top-level objects
/// contribute; entry keys are interned even when their value is a null or
/// a nested structure that produces no tag.
fn parse_json_document(
    feature: &mut FeatureBuilder,
    interner: &mut PropertyInterner,
    text: &str,
) -> Result<()> {
    let document: serde_json::Value = serde_json::from_str(text)?;
    let serde_json::Value::Object(entries) = document else {
        return Ok(());
    };
    for (key, value) in entries {
        let key_id = interner.intern_key(&key);
        let tile_value = match value {
            serde_json::Value::String(s) => TileValue::Str(s),
            serde_json::Value::Bool(b) => TileValue::Bool(b),
            serde_json::Value::Number(number) => number_value(&number),
            _ => continue,
        };
        feature.add_property(key_id, interner.intern_value(tile_value));
    }
    Ok(())
}

/// Numeric JSON text parses as both a double and a long (the long
/// saturating like `strtol`); anything not integer-exact within
/// `FLT_EPSILON` becomes a double, the rest routes by sign.
fn number_value(number: &serde_json::Number) -> TileValue {
    let double = number.as_f64().unwrap_or(f64::NAN);
    let long = number.as_i64().unwrap_or(double as i64);
    if (double - long as f64).abs() > f64::from(f32::EPSILON) {
        TileValue::Double(double)
    } else {
        TileValue::from_int(long)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Column;
    use geo_types::{Geometry, point};

    struct TestRow {
        schema: RowSchema,
        geometry: Option<Geometry<f64>>,
        values: Vec<Option<String>>,
    }

    impl TestRow {
        fn new(columns: Vec<Column>, geometry: Option<Geometry<f64>>) -> Self {
            let values = vec![None; columns.len()];
            TestRow {
                schema: RowSchema::new(columns),
                geometry,
                values,
            }
        }

        fn with_value(mut self, idx: usize, value: &str) -> Self {
            self.values[idx] = Some(value.to_string());
            self
        }
    }

    impl FeatureRow for TestRow {
        fn schema(&self) -> &RowSchema {
            &self.schema
        }

        fn geometry(&self, _idx: usize) -> Result<Option<Geometry<f64>>> {
            Ok(self.geometry.clone())
        }

        fn value(&self, idx: usize) -> Result<Option<ColumnValue<'_>>> {
            let Some(raw) = self.values[idx].as_deref() else {
                return Ok(None);
            };
            let value = match self.schema.columns()[idx].ctype {
                ColumnType::Bool => ColumnValue::Bool(raw == "true"),
                ColumnType::Short => ColumnValue::Short(raw.parse().unwrap()),
                ColumnType::Int => ColumnValue::Int(raw.parse().unwrap()),
                ColumnType::Long => ColumnValue::Long(raw.parse().unwrap()),
                ColumnType::Float => ColumnValue::Float(raw.parse().unwrap()),
                ColumnType::Double => ColumnValue::Double(raw.parse().unwrap()),
                ColumnType::Json => ColumnValue::Json(raw),
                ColumnType::String => ColumnValue::String(raw),
                _ => ColumnValue::Other(raw),
            };
            Ok(Some(value))
        }
    }

    fn geom_column() -> Column {
        Column::new("geom", ColumnType::Geometry)
    }

    fn a_point() -> Option<Geometry<f64>> {
        Some(Geometry::Point(point! { x: 1.0, y: 1.0 }))
    }

    #[test]
    fn zero_extent_is_fatal() {
        let options = AggregateOptions {
            extent: 0,
            ..Default::default()
        };
        assert!(matches!(
            TileAggregate::new(options),
            Err(MvtBuildError::ZeroExtent)
        ));
    }

    #[test]
    fn missing_geometry_column_is_fatal() {
        let mut agg = TileAggregate::new(AggregateOptions::default()).unwrap();
        let row = TestRow::new(vec![Column::new("name", ColumnType::String)], None);
        assert!(matches!(
            agg.push_row(&row),
            Err(MvtBuildError::GeometryColumnNotFound)
        ));
    }

    #[test]
    fn named_geometry_column_wins_over_first_geometry() {
        let mut agg = TileAggregate::new(AggregateOptions {
            geometry_column: Some("geom_b".to_string()),
            ..Default::default()
        })
        .unwrap();
        let row = TestRow::new(
            vec![
                Column::new("geom_a", ColumnType::Geometry),
                Column::new("geom_b", ColumnType::Geometry),
            ],
            a_point(),
        );
        agg.push_row(&row).unwrap();
        assert_eq!(agg.cache.as_ref().unwrap().geom_index, 1);
    }

    #[test]
    fn id_column_of_wrong_type_is_fatal() {
        let mut agg = TileAggregate::new(AggregateOptions {
            id_column: Some("osm_id".to_string()),
            ..Default::default()
        })
        .unwrap();
        let row = TestRow::new(
            vec![geom_column(), Column::new("osm_id", ColumnType::String)],
            a_point(),
        );
        assert!(matches!(
            agg.push_row(&row),
            Err(MvtBuildError::IdColumnNotFound(name)) if name == "osm_id"
        ));
    }

    #[test]
    fn null_geometry_rows_are_skipped() {
        let mut agg = TileAggregate::new(AggregateOptions::default()).unwrap();
        let row = TestRow::new(vec![geom_column()], None);
        agg.push_row(&row).unwrap();
        assert!(agg.layer.as_ref().unwrap().features.is_empty());
        assert_eq!(agg.to_bytes().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn negative_ids_are_ignored() {
        let columns = vec![geom_column(), Column::new("fid", ColumnType::Long)];
        let mut agg = TileAggregate::new(AggregateOptions {
            id_column: Some("fid".to_string()),
            ..Default::default()
        })
        .unwrap();
        agg.push_row(&TestRow::new(columns.clone(), a_point()).with_value(1, "-7"))
            .unwrap();
        agg.push_row(&TestRow::new(columns, a_point()).with_value(1, "7"))
            .unwrap();
        let features = &agg.layer.as_ref().unwrap().features;
        assert_eq!(features[0].id, None);
        assert_eq!(features[1].id, Some(7));
    }

    #[test]
    fn null_attributes_leave_no_tags() {
        let columns = vec![geom_column(), Column::new("name", ColumnType::String)];
        let mut agg = TileAggregate::new(AggregateOptions::default()).unwrap();
        agg.push_row(&TestRow::new(columns, a_point())).unwrap();
        assert_eq!(agg.layer.as_ref().unwrap().features[0].tags, Vec::<u32>::new());
    }

    #[test]
    fn json_documents_intern_keys_lazily() {
        let columns = vec![geom_column(), Column::new("props", ColumnType::Json)];
        let mut agg = TileAggregate::new(AggregateOptions::default()).unwrap();
        agg.push_row(
            &TestRow::new(columns.clone(), a_point())
                .with_value(1, r#"{"kind": "cafe", "open": true, "floors": 2, "rating": 4.5, "annex": {"x": 1}, "note": null}"#),
        )
        .unwrap();
        // Non-object documents are ignored entirely.
        agg.push_row(&TestRow::new(columns, a_point()).with_value(1, "[1, 2, 3]"))
            .unwrap();

        let layer = agg.layer.take().unwrap().freeze();
        // All six keys interned, but null and nested values yield no tags.
        assert_eq!(layer.keys.len(), 6);
        assert!(layer.keys.contains(&"annex".to_string()));
        assert_eq!(layer.features[0].tags.len(), 8);
        assert_eq!(layer.features[1].tags.len(), 0);
        let rating = layer
            .values
            .iter()
            .find_map(|v| v.double_value)
            .expect("4.5 keeps its fraction");
        assert_eq!(rating, 4.5);
        assert!(layer.values.iter().any(|v| v.uint_value == Some(2)));
    }

    #[test]
    fn invalid_json_is_surfaced() {
        let columns = vec![geom_column(), Column::new("props", ColumnType::Json)];
        let mut agg = TileAggregate::new(AggregateOptions::default()).unwrap();
        let row = TestRow::new(columns, a_point()).with_value(1, "{not json");
        assert!(matches!(agg.push_row(&row), Err(MvtBuildError::Json(_))));
    }

    #[test]
    fn push_after_finalize_is_fatal() {
        let mut agg = TileAggregate::new(AggregateOptions::default()).unwrap();
        let _ = agg.to_bytes().unwrap();
        let row = TestRow::new(vec![geom_column()], a_point());
        assert!(matches!(
            agg.push_row(&row),
            Err(MvtBuildError::AggregateFinished)
        ));
    }

    #[test]
    fn combine_requires_built_tiles() {
        let building = TileAggregate::new(AggregateOptions::default()).unwrap();
        let other = TileAggregate::new(AggregateOptions::default()).unwrap();
        assert!(matches!(
            TileAggregate::combine(Some(building), Some(other)),
            Err(MvtBuildError::CombineMissingTile)
        ));

        let one = TileAggregate::new(AggregateOptions::default()).unwrap();
        let combined = TileAggregate::combine(Some(one), None).unwrap();
        assert!(combined.is_some());
        assert!(TileAggregate::combine(None, None).unwrap().is_none());
    }

    #[test]
    fn json_number_promotion() {
        let five: serde_json::Number = serde_json::from_str("5.0").unwrap();
        assert_eq!(number_value(&five), TileValue::Uint(5));
        let frac: serde_json::Number = serde_json::from_str("5.5").unwrap();
        assert_eq!(number_value(&frac), TileValue::Double(5.5));
        let neg: serde_json::Number = serde_json::from_str("-12").unwrap();
        assert_eq!(number_value(&neg), TileValue::Sint(-12));
        let huge: serde_json::Number = serde_json::from_str("1e300").unwrap();
        assert_eq!(number_value(&huge), TileValue::Double(1e300));
    }
}
