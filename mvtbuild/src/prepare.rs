//! Transform world-coordinate geometries into integer tile space.

use geo::{
    AffineOps, AffineTransform, BooleanOps, BoundingRect, HasDimensions, Intersects,
    MapCoordsInPlace, RemoveRepeatedPoints, Simplify,
};
use geo_types::{
    Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Rect,
    coord,
};

/// Geographic footprint of one tile, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl TileBounds {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        TileBounds {
            minx,
            miny,
            maxx,
            maxy,
        }
    }
}

/// Per-aggregation geometry transform: where the tile sits in world space
/// and how its features are clipped.
#[derive(Debug, Clone, PartialEq)]
pub struct GeomTransform {
    pub bounds: TileBounds,
    /// Tile units kept outside `[0, extent]` so boundary-crossing features
    /// render cleanly.
    pub buffer: u32,
    pub clip_geom: bool,
}

impl GeomTransform {
    pub fn new(bounds: TileBounds) -> Self {
        GeomTransform {
            bounds,
            buffer: 256,
            clip_geom: true,
        }
    }
}

/// The dominant basic type of a geometry; collections reduce to the
/// highest-dimensional member type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BasicType {
    Point,
    Line,
    Polygon,
}

/// Project, snap, simplify and clip `geom` into tile coordinate space.
///
/// Returns `None` when the geometry vanishes at any stage; the caller
/// skips the feature. Makes a best effort to keep validity: polygons pass
/// through a validating clipper even when `clip_geom` is off.
pub fn prepare_geometry(
    geom: Geometry<f64>,
    bounds: &TileBounds,
    extent: u32,
    buffer: u32,
    clip_geom: bool,
) -> Option<Geometry<f64>> {
    let width = bounds.maxx - bounds.minx;
    let height = bounds.maxy - bounds.miny;
    if width <= 0.0 || height <= 0.0 {
        return None;
    }

    let mut geom = reduce_to_basic(geom)?;
    if geom.is_empty() {
        return None;
    }

    // Transform to tile coordinate space; the Y flip puts the origin at
    // the top-left corner.
    let fx = f64::from(extent) / width;
    let fy = -f64::from(extent) / height;
    let to_tile = AffineTransform::new(fx, 0.0, -bounds.minx * fx, 0.0, fy, -bounds.maxy * fy);
    geom.affine_transform_mut(&to_tile);

    snap_to_grid(&mut geom);
    simplify_in_place(&mut geom);
    if let Geometry::MultiPoint(multipoint) = &mut geom {
        *multipoint = multipoint.remove_repeated_points();
    }
    if geom.is_empty() {
        return None;
    }

    let geom = clip_and_validate(geom, extent, buffer, clip_geom)?;
    if geom.is_empty() {
        return None;
    }
    Some(geom)
}

fn basic_type(geom: &Geometry<f64>) -> Option<BasicType> {
    match geom {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Some(BasicType::Point),
        Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
            Some(BasicType::Line)
        }
        Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => Some(BasicType::Polygon),
        Geometry::GeometryCollection(collection) => {
            collection.0.iter().filter_map(basic_type).max()
        }
    }
}

/// Reduce to one of the six encodable variants: collections drop members
/// below the dominant basic type, singleton collections unwrap.
fn reduce_to_basic(geom: Geometry<f64>) -> Option<Geometry<f64>> {
    let target = basic_type(&geom)?;
    let geom = match geom {
        Geometry::GeometryCollection(_) => match target {
            BasicType::Point => {
                let mut points = Vec::new();
                collect_points(geom, &mut points);
                Geometry::MultiPoint(MultiPoint::new(points))
            }
            BasicType::Line => {
                let mut lines = Vec::new();
                collect_lines(geom, &mut lines);
                Geometry::MultiLineString(MultiLineString::new(lines))
            }
            BasicType::Polygon => {
                let mut polygons = Vec::new();
                collect_polygons(geom, &mut polygons);
                Geometry::MultiPolygon(MultiPolygon::new(polygons))
            }
        },
        Geometry::Line(line) => Geometry::LineString(line.into()),
        Geometry::Rect(rect) => Geometry::Polygon(rect.to_polygon()),
        Geometry::Triangle(triangle) => Geometry::Polygon(triangle.to_polygon()),
        geom => geom,
    };
    Some(unwrap_single(geom))
}

fn collect_points(geom: Geometry<f64>, out: &mut Vec<Point<f64>>) {
    match geom {
        Geometry::Point(point) => out.push(point),
        Geometry::MultiPoint(multipoint) => out.extend(multipoint.0),
        Geometry::GeometryCollection(collection) => {
            for member in collection.0 {
                collect_points(member, out);
            }
        }
        _ => {}
    }
}

fn collect_lines(geom: Geometry<f64>, out: &mut Vec<LineString<f64>>) {
    match geom {
        Geometry::Line(line) => out.push(line.into()),
        Geometry::LineString(line) => out.push(line),
        Geometry::MultiLineString(multiline) => out.extend(multiline.0),
        Geometry::GeometryCollection(collection) => {
            for member in collection.0 {
                collect_lines(member, out);
            }
        }
        _ => {}
    }
}

fn collect_polygons(geom: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geom {
        Geometry::Polygon(polygon) => out.push(polygon),
        Geometry::MultiPolygon(multipolygon) => out.extend(multipolygon.0),
        Geometry::Rect(rect) => out.push(rect.to_polygon()),
        Geometry::Triangle(triangle) => out.push(triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for member in collection.0 {
                collect_polygons(member, out);
            }
        }
        _ => {}
    }
}

fn unwrap_single(geom: Geometry<f64>) -> Geometry<f64> {
    match geom {
        Geometry::MultiPoint(mut multipoint) if multipoint.0.len() == 1 => {
            Geometry::Point(multipoint.0.remove(0))
        }
        Geometry::MultiLineString(mut multiline) if multiline.0.len() == 1 => {
            Geometry::LineString(multiline.0.remove(0))
        }
        Geometry::MultiPolygon(mut multipolygon) if multipolygon.0.len() == 1 => {
            Geometry::Polygon(multipolygon.0.remove(0))
        }
        geom => geom,
    }
}

/// Snap to integer precision and drop the duplicate consecutive points
/// the rounding produces.
fn snap_to_grid(geom: &mut Geometry<f64>) {
    geom.map_coords_in_place(|Coord { x, y }| Coord {
        x: x.round(),
        y: y.round(),
    });
    match geom {
        Geometry::LineString(line) => *line = line.remove_repeated_points(),
        Geometry::MultiLineString(multiline) => *multiline = multiline.remove_repeated_points(),
        Geometry::Polygon(polygon) => *polygon = polygon.remove_repeated_points(),
        Geometry::MultiPolygon(multipolygon) => {
            *multipolygon = multipolygon.remove_repeated_points();
        }
        _ => {}
    }
}

/// Remove exactly-colinear points; collapsed parts are not preserved here,
/// degenerate leftovers are dropped at encode time.
fn simplify_in_place(geom: &mut Geometry<f64>) {
    match geom {
        Geometry::LineString(line) => *line = line.simplify(&0.0),
        Geometry::MultiLineString(multiline) => *multiline = multiline.simplify(&0.0),
        Geometry::Polygon(polygon) => *polygon = polygon.simplify(&0.0),
        Geometry::MultiPolygon(multipolygon) => *multipolygon = multipolygon.simplify(&0.0),
        _ => {}
    }
}

fn clip_and_validate(
    geom: Geometry<f64>,
    extent: u32,
    buffer: u32,
    clip_geom: bool,
) -> Option<Geometry<f64>> {
    let lo = -f64::from(buffer);
    let hi = f64::from(extent) + f64::from(buffer);
    let clip_rect = Rect::new(coord! { x: lo, y: lo }, coord! { x: hi, y: hi });

    match geom {
        // Polygons always go through the validating clipper; without
        // clipping their own bbox is used, validating without trimming.
        Geometry::Polygon(polygon) => {
            let rect = if clip_geom {
                clip_rect
            } else {
                polygon.bounding_rect()?
            };
            clipped_polygons(polygon.intersection(&rect.to_polygon()))
        }
        Geometry::MultiPolygon(multipolygon) => {
            let rect = if clip_geom {
                clip_rect
            } else {
                multipolygon.bounding_rect()?
            };
            let mask = MultiPolygon::new(vec![rect.to_polygon()]);
            clipped_polygons(multipolygon.intersection(&mask))
        }
        geom if !clip_geom => Some(geom),
        Geometry::Point(point) => clip_rect
            .intersects(&point)
            .then_some(Geometry::Point(point)),
        Geometry::MultiPoint(mut multipoint) => {
            multipoint.0.retain(|point| clip_rect.intersects(point));
            (!multipoint.0.is_empty()).then_some(Geometry::MultiPoint(multipoint))
        }
        Geometry::LineString(line) => {
            clip_lines(MultiLineString::new(vec![line]), &clip_rect)
        }
        Geometry::MultiLineString(multiline) => clip_lines(multiline, &clip_rect),
        geom => Some(geom),
    }
}

fn clipped_polygons(mut clipped: MultiPolygon<f64>) -> Option<Geometry<f64>> {
    if clipped.0.is_empty() {
        return None;
    }
    let mut geom = if clipped.0.len() == 1 {
        Geometry::Polygon(clipped.0.remove(0))
    } else {
        Geometry::MultiPolygon(clipped)
    };
    // The clipper works in f64 and may leave fractional intersection
    // points behind.
    snap_to_grid(&mut geom);
    Some(geom)
}

// Inclusive box predicates; line bboxes are often degenerate, which rules
// out the relate-based traits here.
fn rect_overlaps(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x && b.min().x <= a.max().x && a.min().y <= b.max().y && b.min().y <= a.max().y
}

fn rect_covers(outer: &Rect<f64>, inner: &Rect<f64>) -> bool {
    outer.min().x <= inner.min().x
        && inner.max().x <= outer.max().x
        && outer.min().y <= inner.min().y
        && inner.max().y <= outer.max().y
}

fn clip_lines(lines: MultiLineString<f64>, clip_rect: &Rect<f64>) -> Option<Geometry<f64>> {
    let bbox = lines.bounding_rect()?;
    if !rect_overlaps(clip_rect, &bbox) {
        return None;
    }
    if rect_covers(clip_rect, &bbox) {
        return Some(unwrap_single(Geometry::MultiLineString(lines)));
    }
    let mut clipped = clip_rect.to_polygon().clip(&lines, false);
    clipped.0.retain(|line| line.0.len() > 1);
    if clipped.0.is_empty() {
        return None;
    }
    let mut geom = unwrap_single(Geometry::MultiLineString(clipped));
    snap_to_grid(&mut geom);
    Some(geom)
}
