//! Encode point arrays into the MVT geometry command stream
//! <https://github.com/mapbox/vector-tile-spec/tree/master/2.1>

use geo_types::Coord;

/// Command to be executed and the number of times that the command will be executed
/// <https://github.com/mapbox/vector-tile-spec/tree/master/2.1#431-command-integers>
pub(crate) struct CommandInteger(pub(crate) u32);

pub(crate) enum Command {
    MoveTo = 1,
    LineTo = 2,
    ClosePath = 7,
}

impl CommandInteger {
    pub(crate) fn from(id: Command, count: u32) -> u32 {
        ((id as u32) & 0x7) | (count << 3)
    }
    #[cfg(test)]
    fn id(&self) -> u32 {
        self.0 & 0x7
    }
    #[cfg(test)]
    fn count(&self) -> u32 {
        self.0 >> 3
    }
}

/// Commands requiring parameters are followed by a ParameterInteger for each parameter required by that command
/// <https://github.com/mapbox/vector-tile-spec/tree/master/2.1#432-parameter-integers>
pub(crate) struct ParameterInteger(pub(crate) u32);

impl ParameterInteger {
    pub(crate) fn from(value: i32) -> u32 {
        ((value << 1) ^ (value >> 31)) as u32
    }
    #[cfg(test)]
    pub(crate) fn value(&self) -> i32 {
        ((self.0 >> 1) as i32) ^ (-((self.0 & 1) as i32))
    }
}

/// How a point array is laid out in the command stream.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathKind {
    /// `MoveTo(n)` run: point and multi-point geometries.
    Points,
    /// `MoveTo(1)` + `LineTo(n-1)` run.
    Line,
    /// Like [`PathKind::Line`], but the explicit closing point is dropped
    /// and a trailing `ClosePath(1)` is emitted.
    Ring,
}

/// Cursor carrying the previous coordinate across runs, so that deltas
/// stay relative over the sub-geometries of one feature.
#[derive(Default, Clone, Copy)]
pub(crate) struct Cursor {
    x: i32,
    y: i32,
}

/// Append one point-array run to `seq` and advance the cursor.
///
/// Callers guarantee at least one point for [`PathKind::Points`], two for
/// [`PathKind::Line`] and four (including the closing point) for
/// [`PathKind::Ring`]. Word counts follow the fixed sizing: `1 + 2n` for
/// points, `2 + 2n` for lines and `3 + 2(n-1)` for rings.
pub(crate) fn encode_path(
    kind: PathKind,
    coords: &[Coord<f64>],
    cursor: &mut Cursor,
    seq: &mut Vec<u32>,
) {
    let start = seq.len();
    let mut count = 0u32;
    // Command slots are patched once the emitted point count is known.
    seq.push(0);
    for (i, coord) in coords.iter().enumerate() {
        // The closing point of a ring is implied by ClosePath.
        if kind == PathKind::Ring && i == coords.len() - 1 {
            break;
        }
        if i == 1 && kind != PathKind::Points {
            seq.push(0);
        }
        let x = coord.x as i32;
        let y = coord.y as i32;
        seq.push(ParameterInteger::from(x.saturating_sub(cursor.x)));
        seq.push(ParameterInteger::from(y.saturating_sub(cursor.y)));
        cursor.x = x;
        cursor.y = y;
        count += 1;
    }
    match kind {
        PathKind::Points => seq[start] = CommandInteger::from(Command::MoveTo, count),
        PathKind::Line | PathKind::Ring => {
            seq[start] = CommandInteger::from(Command::MoveTo, 1);
            seq[start + 3] = CommandInteger::from(Command::LineTo, count - 1);
        }
    }
    if kind == PathKind::Ring {
        seq.push(CommandInteger::from(Command::ClosePath, 1));
    }
}
