//! Feature assembly: id, tag pairs and the encoded geometry.

use crate::commands::{Cursor, PathKind, encode_path};
use crate::error::{MvtBuildError, Result};
use crate::vector_tile::tile::{self, GeomType};
use geo_types::{Geometry, LineString, Polygon};

// Must be >= 2, as tags are appended in pairs.
const TAGS_INITIAL_CAPACITY: usize = 20;

/// Accumulates one feature while its row is processed.
pub(crate) struct FeatureBuilder {
    id: Option<u64>,
    tags: Vec<u32>,
    geom_type: GeomType,
    geometry: Vec<u32>,
}

impl FeatureBuilder {
    pub(crate) fn new() -> Self {
        FeatureBuilder {
            id: None,
            tags: Vec::with_capacity(TAGS_INITIAL_CAPACITY),
            geom_type: GeomType::Unknown,
            geometry: Vec::new(),
        }
    }

    pub(crate) fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    pub(crate) fn add_property(&mut self, key_id: u32, value_id: u32) {
        self.tags.push(key_id);
        self.tags.push(value_id);
    }

    /// True when no command words were emitted, i.e. every part of the
    /// geometry was degenerate.
    pub(crate) fn geometry_is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    pub(crate) fn build(self) -> tile::Feature {
        let mut feature = tile::Feature {
            id: self.id,
            tags: self.tags,
            geometry: self.geometry,
            ..Default::default()
        };
        feature.set_type(self.geom_type);
        feature
    }
}

fn rings(polygon: &Polygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    std::iter::once(polygon.exterior()).chain(polygon.interiors().iter())
}

/// Encode `geom` into the builder's command stream, one run per
/// sub-geometry with the delta cursor threaded through all of them.
///
/// Coordinates must already be integral tile-space values. Degenerate
/// parts (lines with fewer than two points, rings with fewer than four
/// including the closing point) are dropped.
pub(crate) fn encode_geometry(builder: &mut FeatureBuilder, geom: &Geometry<f64>) -> Result<()> {
    let mut cursor = Cursor::default();
    match geom {
        Geometry::Point(point) => {
            builder.geom_type = GeomType::Point;
            builder.geometry.reserve(3);
            encode_path(
                PathKind::Points,
                std::slice::from_ref(&point.0),
                &mut cursor,
                &mut builder.geometry,
            );
        }
        Geometry::MultiPoint(multipoint) => {
            builder.geom_type = GeomType::Point;
            if multipoint.0.is_empty() {
                return Ok(());
            }
            let coords: Vec<_> = multipoint.0.iter().map(|point| point.0).collect();
            builder.geometry.reserve(1 + 2 * coords.len());
            encode_path(PathKind::Points, &coords, &mut cursor, &mut builder.geometry);
        }
        Geometry::LineString(line) => {
            builder.geom_type = GeomType::Linestring;
            builder.geometry.reserve(2 + 2 * line.0.len());
            encode_line(builder, line, &mut cursor);
        }
        Geometry::MultiLineString(multiline) => {
            builder.geom_type = GeomType::Linestring;
            let capacity: usize = multiline.0.iter().map(|line| 2 + 2 * line.0.len()).sum();
            builder.geometry.reserve(capacity);
            for line in &multiline.0 {
                encode_line(builder, line, &mut cursor);
            }
        }
        Geometry::Polygon(polygon) => {
            builder.geom_type = GeomType::Polygon;
            let capacity: usize = rings(polygon).map(|ring| 1 + 2 * ring.0.len()).sum();
            builder.geometry.reserve(capacity);
            for ring in rings(polygon) {
                encode_ring(builder, ring, &mut cursor);
            }
        }
        Geometry::MultiPolygon(multipolygon) => {
            builder.geom_type = GeomType::Polygon;
            let capacity: usize = multipolygon
                .0
                .iter()
                .flat_map(rings)
                .map(|ring| 1 + 2 * ring.0.len())
                .sum();
            builder.geometry.reserve(capacity);
            for polygon in &multipolygon.0 {
                for ring in rings(polygon) {
                    encode_ring(builder, ring, &mut cursor);
                }
            }
        }
        Geometry::Line(_) => return Err(MvtBuildError::UnsupportedGeometry("Line")),
        Geometry::Rect(_) => return Err(MvtBuildError::UnsupportedGeometry("Rect")),
        Geometry::Triangle(_) => return Err(MvtBuildError::UnsupportedGeometry("Triangle")),
        Geometry::GeometryCollection(_) => {
            return Err(MvtBuildError::UnsupportedGeometry("GeometryCollection"));
        }
    }
    Ok(())
}

fn encode_line(builder: &mut FeatureBuilder, line: &LineString<f64>, cursor: &mut Cursor) {
    if line.0.len() > 1 {
        encode_path(PathKind::Line, &line.0, cursor, &mut builder.geometry);
    }
}

fn encode_ring(builder: &mut FeatureBuilder, ring: &LineString<f64>, cursor: &mut Cursor) {
    // A closed ring needs at least a triangle: 4 points with the closure.
    if ring.0.len() > 3 {
        encode_path(PathKind::Ring, &ring.0, cursor, &mut builder.geometry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{MultiLineString, MultiPoint, MultiPolygon, line_string, point, polygon};

    fn encoded(geom: &Geometry<f64>) -> (GeomType, Vec<u32>) {
        let mut builder = FeatureBuilder::new();
        encode_geometry(&mut builder, geom).unwrap();
        (builder.geom_type, builder.geometry)
    }

    #[test]
    fn point() {
        let (geom_type, seq) = encoded(&Geometry::Point(point! { x: 25.0, y: 17.0 }));
        assert_eq!(geom_type, GeomType::Point);
        assert_eq!(seq, [9, 50, 34]);
    }

    #[test]
    fn multipoint_is_a_single_run() {
        let multipoint = MultiPoint::from(vec![(5.0, 7.0), (3.0, 2.0)]);
        let (geom_type, seq) = encoded(&Geometry::MultiPoint(multipoint));
        assert_eq!(geom_type, GeomType::Point);
        assert_eq!(seq, [17, 10, 14, 3, 9]);
    }

    #[test]
    fn multiline_shares_the_cursor() {
        let multiline = MultiLineString::new(vec![
            line_string![(x: 2.0, y: 2.0), (x: 2.0, y: 10.0), (x: 10.0, y: 10.0)],
            line_string![(x: 1.0, y: 1.0), (x: 3.0, y: 5.0)],
        ]);
        let (geom_type, seq) = encoded(&Geometry::MultiLineString(multiline));
        assert_eq!(geom_type, GeomType::Linestring);
        assert_eq!(seq, [9, 4, 4, 18, 0, 16, 16, 0, 9, 17, 17, 10, 4, 8]);
    }

    #[test]
    fn polygon_ring_sizes_match_the_formula() {
        let polygon = polygon![(x: 3.0, y: 6.0), (x: 8.0, y: 12.0), (x: 20.0, y: 34.0)];
        let (geom_type, seq) = encoded(&Geometry::Polygon(polygon));
        assert_eq!(geom_type, GeomType::Polygon);
        assert_eq!(seq, [9, 6, 12, 18, 10, 12, 24, 44, 15]);
        // Ring of n points encodes to 3 + 2 * (n - 1) words.
        assert_eq!(seq.len(), 3 + 2 * (4 - 1));
    }

    #[test]
    fn multipolygon_with_hole() {
        // Example from the vector tile specification, section 4.3.5.
        let multipolygon = MultiPolygon::new(vec![
            polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            Polygon::new(
                line_string![
                    (x: 11.0, y: 11.0), (x: 20.0, y: 11.0), (x: 20.0, y: 20.0),
                    (x: 11.0, y: 20.0), (x: 11.0, y: 11.0)
                ],
                vec![line_string![
                    (x: 13.0, y: 13.0), (x: 13.0, y: 17.0), (x: 17.0, y: 17.0),
                    (x: 17.0, y: 13.0), (x: 13.0, y: 13.0)
                ]],
            ),
        ]);
        let (geom_type, seq) = encoded(&Geometry::MultiPolygon(multipolygon));
        assert_eq!(geom_type, GeomType::Polygon);
        assert_eq!(
            seq,
            [
                9, 0, 0, 26, 20, 0, 0, 20, 19, 0, 15, 9, 22, 2, 26, 18, 0, 0, 18, 17, 0, 15, 9, 4,
                13, 26, 0, 8, 8, 0, 0, 7, 15
            ]
        );
    }

    #[test]
    fn degenerate_parts_are_dropped() {
        let multiline = MultiLineString::new(vec![
            line_string![(x: 1.0, y: 1.0)],
            line_string![(x: 2.0, y: 2.0), (x: 2.0, y: 10.0)],
        ]);
        let (_, seq) = encoded(&Geometry::MultiLineString(multiline));
        assert_eq!(seq, [9, 4, 4, 10, 0, 16]);

        let mut builder = FeatureBuilder::new();
        let collapsed = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        encode_geometry(&mut builder, &Geometry::Polygon(collapsed)).unwrap();
        assert!(builder.geometry_is_empty());
    }

    #[test]
    fn unsupported_variants_are_fatal() {
        let rect = geo_types::Rect::new((0.0, 0.0), (1.0, 1.0));
        let mut builder = FeatureBuilder::new();
        assert!(matches!(
            encode_geometry(&mut builder, &Geometry::Rect(rect)),
            Err(MvtBuildError::UnsupportedGeometry("Rect"))
        ));
    }

    #[test]
    fn builder_tags_and_id() {
        let mut builder = FeatureBuilder::new();
        builder.set_id(42);
        builder.add_property(0, 0);
        builder.add_property(1, 3);
        encode_geometry(&mut builder, &Geometry::Point(point! { x: 1.0, y: 1.0 })).unwrap();
        let feature = builder.build();
        assert_eq!(feature.id, Some(42));
        assert_eq!(feature.tags, [0, 0, 1, 3]);
        assert_eq!(feature.r#type(), GeomType::Point);
    }
}
