//! Incremental [Mapbox Vector Tile](https://github.com/mapbox/vector-tile-spec/tree/master/2.1)
//! aggregation.
//!
//! `mvtbuild` turns a stream of rows — each pairing a geometry with an
//! arbitrary attribute record — into one packed MVT layer: geometries are
//! projected, snapped, simplified and clipped into tile space, encoded
//! into the MVT command stream, and attribute keys and values are
//! deduplicated into the layer dictionaries. Finalized tiles can be merged
//! without re-deserializing their features, so partial aggregations
//! combine cheaply.
//!
//! Rows are fed through the [`FeatureRow`] trait, implemented by the host
//! over its native tuple representation.
//!
//! ## Building a tile from rows
//!
//! ```rust
//! use geo_types::{Geometry, point};
//! use mvtbuild::error::Result;
//! use mvtbuild::{
//!     AggregateOptions, Column, ColumnType, ColumnValue, FeatureRow, GeomTransform,
//!     RowSchema, TileAggregate, TileBounds,
//! };
//!
//! struct CityRow {
//!     schema: RowSchema,
//!     location: Geometry<f64>,
//!     name: &'static str,
//! }
//!
//! impl FeatureRow for CityRow {
//!     fn schema(&self) -> &RowSchema {
//!         &self.schema
//!     }
//!     fn geometry(&self, _idx: usize) -> Result<Option<Geometry<f64>>> {
//!         Ok(Some(self.location.clone()))
//!     }
//!     fn value(&self, idx: usize) -> Result<Option<ColumnValue<'_>>> {
//!         match idx {
//!             1 => Ok(Some(ColumnValue::String(self.name))),
//!             _ => Ok(None),
//!         }
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let schema = RowSchema::new(vec![
//!     Column::new("geom", ColumnType::Geometry),
//!     Column::new("name", ColumnType::String),
//! ]);
//! let mut options = AggregateOptions::new("cities");
//! options.transform = Some(GeomTransform::new(TileBounds::new(0.0, 0.0, 100.0, 100.0)));
//!
//! let mut agg = TileAggregate::new(options)?;
//! agg.push_row(&CityRow {
//!     schema,
//!     location: point! { x: 50.0, y: 50.0 }.into(),
//!     name: "Hilldale",
//! })?;
//! let bytes = agg.to_bytes()?;
//! assert!(!bytes.is_empty());
//! # Ok(())
//! # }
//! ```

mod aggregate;
mod combine;
mod commands;
pub mod error;
mod feature;
mod interner;
mod prepare;
mod row;
mod tile_value;
#[rustfmt::skip]
pub mod vector_tile;

pub use aggregate::{AggregateOptions, TileAggregate};
pub use interner::PropertyInterner;
pub use prepare::{GeomTransform, TileBounds, prepare_geometry};
pub use prost::Message;
pub use row::{Column, ColumnType, ColumnValue, FeatureRow, RowSchema};
pub use tile_value::TileValue;
