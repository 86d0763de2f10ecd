//! Geometry helpers on WGS84 linestrings
//!
//! Coordinates are `x = longitude`, `y = latitude`. Distances are meters on a
//! sphere, small scale computations (projection of a point on a segment) use a
//! local equirectangular projection.

use geo::{
    Bearing, Coord, Destination, Distance, Haversine, Line, LineInterpolatePoint, LineLocatePoint,
    LineString, Point, Rect,
};

use crate::{Error, Meters};

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Distance below which two positions along a line are considered equal
pub const COORD_EQUAL_ATOL: Meters = 1e-6;

/// Great circle distance in meters
pub fn haversine(from: Coord<f64>, to: Coord<f64>) -> Meters {
    Haversine.distance(Point::from(from), Point::from(to))
}

/// Initial bearing in degrees, clockwise from north, in `[0, 360)`
pub fn bearing(from: Coord<f64>, to: Coord<f64>) -> f64 {
    Haversine.bearing(Point::from(from), Point::from(to)).rem_euclid(360.0)
}

/// Bearing from the first to the last coordinate of a line
pub fn line_bearing(line: &LineString<f64>) -> Option<f64> {
    let first = line.0.first()?;
    let last = line.0.last()?;
    if first == last {
        return None;
    }
    Some(bearing(*first, *last))
}

/// Smallest angle between two bearings, in `[0, 180]`
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    if diff > 180.0 { 360.0 - diff } else { diff }
}

pub fn line_length(line: &LineString<f64>) -> Meters {
    line.lines().map(|l| haversine(l.start, l.end)).sum()
}

/// Cumulated distance at every coordinate of a line
fn cumulative_lengths(line: &LineString<f64>) -> Vec<Meters> {
    let mut res = Vec::with_capacity(line.0.len());
    let mut total = 0.0;
    res.push(0.0);
    for l in line.lines() {
        total += haversine(l.start, l.end);
        res.push(total);
    }
    res
}

/// Equirectangular projection in meters around an origin
#[derive(Debug, Clone, Copy)]
pub struct LocalProjection {
    origin: Coord<f64>,
    cos_lat: f64,
}

impl LocalProjection {
    pub fn new(origin: Coord<f64>) -> Self {
        Self {
            origin,
            cos_lat: origin.y.to_radians().cos(),
        }
    }

    pub fn project(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (c.x - self.origin.x).to_radians() * self.cos_lat * EARTH_RADIUS_M,
            y: (c.y - self.origin.y).to_radians() * EARTH_RADIUS_M,
        }
    }
}

/// Bounding box around a position, `distance` meters in every direction
pub fn envelope(center: Coord<f64>, distance: Meters) -> Rect<f64> {
    let center = Point::from(center);
    let north = Haversine.destination(center, 0.0, distance);
    let east = Haversine.destination(center, 90.0, distance);
    let dlat = (north.y() - center.y()).abs();
    let dlon = (east.x() - center.x()).abs();
    Rect::new(
        Coord {
            x: center.x() - dlon,
            y: center.y() - dlat,
        },
        Coord {
            x: center.x() + dlon,
            y: center.y() + dlat,
        },
    )
}

/// Projection of a point on a line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineLocation {
    /// Distance along the line to the projected point
    pub along: Meters,
    /// Distance from the point to the line
    pub offset: Meters,
    pub projected: Coord<f64>,
}

/// Locate the closest position of a line to a point
///
/// Segments are searched in a projection centered on the point, where the
/// located fraction of a segment is the same as on the WGS84 segment.
pub fn line_locate(line: &LineString<f64>, point: Coord<f64>) -> Option<LineLocation> {
    let proj = LocalProjection::new(point);
    let origin = Point::new(0.0, 0.0);
    let mut along = 0.0;
    let mut best: Option<LineLocation> = None;

    for segment in line.lines() {
        let seg_length = haversine(segment.start, segment.end);
        let projected = Line::new(proj.project(segment.start), proj.project(segment.end));
        let t = projected.line_locate_point(&origin).unwrap_or(0.0).clamp(0.0, 1.0);
        let Some(located) = segment.line_interpolate_point(t) else {
            along += seg_length;
            continue;
        };
        let offset = haversine(point, located.0);

        if best.is_none_or(|b| offset < b.offset) {
            best = Some(LineLocation {
                along: along + t * seg_length,
                offset,
                projected: located.0,
            });
        }
        along += seg_length;
    }

    if best.is_none() {
        let first = *line.0.first()?;
        best = Some(LineLocation {
            along: 0.0,
            offset: haversine(first, point),
            projected: first,
        });
    }
    best
}

/// Position at a distance along a line, clamped to the line ends
pub fn point_at(line: &LineString<f64>, distance: Meters) -> Option<Coord<f64>> {
    let first = *line.0.first()?;
    if distance <= 0.0 {
        return Some(first);
    }

    let mut walked = 0.0;
    for segment in line.lines() {
        let seg_length = haversine(segment.start, segment.end);
        if walked + seg_length >= distance && seg_length > 0.0 {
            let t = (distance - walked) / seg_length;
            return segment.line_interpolate_point(t).map(|p| p.0);
        }
        walked += seg_length;
    }
    line.0.last().copied()
}

/// Coordinates sampled every `step` meters, both ends included
pub fn sample_points(line: &LineString<f64>, step: Meters) -> Vec<Coord<f64>> {
    let length = line_length(line);
    if length <= 0.0 || step <= 0.0 {
        return line.0.first().copied().into_iter().collect();
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = (length / step).ceil().max(1.0) as usize;
    (0..=count)
        .filter_map(|i| point_at(line, length * i as f64 / count as f64))
        .collect()
}

/// Line in reverse direction
pub fn reverse(line: &LineString<f64>) -> LineString<f64> {
    LineString::new(line.0.iter().rev().copied().collect())
}

/// Part of a line between the distances `start` and `end`
///
/// `start == end` gives a degenerate line made of the same point twice.
pub fn sublinestring(line: &LineString<f64>, start: Meters, end: Meters) -> Result<LineString<f64>, Error> {
    let length = line_length(line);
    if start < 0.0 || start > end || start > length + COORD_EQUAL_ATOL || end > length + COORD_EQUAL_ATOL {
        return Err(Error::InvalidData(format!(
            "input must be 0 <= start <= end <= length, got {start}, {end} for length {length}"
        )));
    }
    let end = end.min(length);
    let start = start.min(end);

    if start <= COORD_EQUAL_ATOL && (length - end).abs() <= COORD_EQUAL_ATOL {
        return Ok(line.clone());
    }

    let invalid = || Error::InvalidData("empty linestring".to_string());
    if (end - start).abs() <= COORD_EQUAL_ATOL {
        let p = point_at(line, start).ok_or_else(invalid)?;
        return Ok(LineString::new(vec![p, p]));
    }

    let dists = cumulative_lengths(line);
    let mut coords = vec![point_at(line, start).ok_or_else(invalid)?];
    coords.extend(
        line.0
            .iter()
            .zip(&dists)
            .filter(|(_, d)| **d > start + COORD_EQUAL_ATOL && **d < end - COORD_EQUAL_ATOL)
            .map(|(c, _)| *c),
    );
    coords.push(point_at(line, end).ok_or_else(invalid)?);

    Ok(LineString::new(coords))
}

/// Cut lines between optional start and end distances
///
/// Missing starts are 0, missing ends the line length (or 0 and 1 when
/// `normalized`, where distances are fractions of the length).
pub fn substring(
    lines: &[LineString<f64>],
    starts: &[Option<f64>],
    ends: &[Option<f64>],
    normalized: bool,
) -> Result<Vec<LineString<f64>>, Error> {
    if lines.len() != starts.len() || lines.len() != ends.len() {
        return Err(Error::InvalidData(
            "lines, starts and ends must have the same length".to_string(),
        ));
    }

    lines
        .iter()
        .zip(starts.iter().zip(ends))
        .map(|(line, (start, end))| {
            let length = line_length(line);
            let scale = if normalized { length } else { 1.0 };
            let start = start.map_or(0.0, |s| s * scale);
            let end = end.map_or(length, |e| e * scale);
            if start > end {
                return Err(Error::InvalidData("starts must be smaller than ends".to_string()));
            }
            sublinestring(line, start, end)
        })
        .collect()
}

/// Concatenate lines into one, reversing parts when they only connect by
/// their end. Consecutive parts must touch.
pub fn linemerge(lines: &[LineString<f64>]) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let mut part = line.0.clone();
        let reverse = match coords.last() {
            Some(last) => part.first() != Some(last) && part.last() == Some(last),
            None => lines.get(i + 1).is_some_and(|next| {
                let touches = |c: Option<&Coord<f64>>| {
                    c.is_some_and(|c| next.0.first() == Some(c) || next.0.last() == Some(c))
                };
                touches(part.first()) && !touches(part.last())
            }),
        };
        if reverse {
            part.reverse();
        }

        if coords.last().is_some() && coords.last() == part.first() {
            part.remove(0);
        }
        coords.extend(part);
    }
    LineString::new(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn straight_line() -> LineString<f64> {
        // three points along the equator, ~111 m apart
        line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0), (x: 0.002, y: 0.0)]
    }

    #[test]
    fn haversine_one_degree() {
        let d = haversine(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 1.0 });
        assert!(approx(d, 111_195.0, 10.0));
    }

    #[test]
    fn bearings() {
        let o = Coord { x: 0.0, y: 0.0 };
        assert!(approx(bearing(o, Coord { x: 0.0, y: 1.0 }), 0.0, 1e-9));
        assert!(approx(bearing(o, Coord { x: 1.0, y: 0.0 }), 90.0, 1e-9));
        assert!(approx(angle_difference(350.0, 10.0), 20.0, 1e-9));
        assert!(approx(angle_difference(90.0, 270.0), 180.0, 1e-9));
    }

    #[test]
    fn locate_point_on_line() {
        let line = straight_line();
        let loc = line_locate(&line, Coord { x: 0.0015, y: 0.0001 }).unwrap();
        let total = line_length(&line);
        assert!(approx(loc.along, total * 0.75, 0.5));
        assert!(approx(loc.offset, 11.1, 0.5));
        assert!(approx(loc.projected.y, 0.0, 1e-7));
    }

    #[test]
    fn sublinestring_bounds() {
        let line = straight_line();
        let total = line_length(&line);

        let half = sublinestring(&line, 0.0, total / 2.0).unwrap();
        assert!(approx(line_length(&half), total / 2.0, 1e-3));
        assert_eq!(half.0.len(), 2);

        let middle = sublinestring(&line, total / 4.0, total * 3.0 / 4.0).unwrap();
        assert_eq!(middle.0.len(), 3);
        assert!(approx(line_length(&middle), total / 2.0, 1e-3));

        let point = sublinestring(&line, 10.0, 10.0).unwrap();
        assert_eq!(point.0.len(), 2);
        assert_eq!(point.0[0], point.0[1]);

        assert_eq!(sublinestring(&line, 0.0, total).unwrap(), line);
        assert!(sublinestring(&line, 20.0, 10.0).is_err());
        assert!(sublinestring(&line, 0.0, total * 2.0).is_err());
    }

    #[test]
    fn substring_defaults_and_normalized() {
        let line = straight_line();
        let total = line_length(&line);
        let res = substring(
            &[line.clone(), line.clone()],
            &[None, Some(0.5)],
            &[Some(total / 2.0), None],
            false,
        )
        .unwrap();
        assert!(approx(line_length(&res[0]), total / 2.0, 1e-3));
        assert!(approx(line_length(&res[1]), total - 0.5, 1e-3));

        let res = substring(&[line.clone()], &[Some(0.25)], &[Some(0.5)], true).unwrap();
        assert!(approx(line_length(&res[0]), total / 4.0, 1e-3));

        assert!(substring(&[line], &[Some(0.6)], &[Some(0.5)], true).is_err());
    }

    #[test]
    fn merge_lines_in_any_direction() {
        let a = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)];
        let b = line_string![(x: 2.0, y: 0.0), (x: 1.0, y: 0.0)];
        let c = line_string![(x: 2.0, y: 0.0), (x: 3.0, y: 0.0)];
        let merged = linemerge(&[a, b, c]);
        assert_eq!(
            merged,
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 3.0, y: 0.0)]
        );

        let reversed_first = linemerge(&[
            line_string![(x: 1.0, y: 0.0), (x: 0.0, y: 0.0)],
            line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)],
        ]);
        assert_eq!(reversed_first.0.first(), Some(&Coord { x: 0.0, y: 0.0 }));
        assert_eq!(reversed_first.0.len(), 3);

        // parts of a closed ring keep their direction
        let ring = linemerge(&[
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)],
            line_string![(x: 1.0, y: 1.0), (x: 0.0, y: 0.0)],
        ]);
        assert_eq!(ring.0[1], Coord { x: 1.0, y: 0.0 });
        assert_eq!(ring.0.len(), 4);
    }

    #[test]
    fn samples_cover_line() {
        let line = straight_line();
        let samples = sample_points(&line, 50.0);
        assert_eq!(samples.first(), line.0.first());
        assert!(approx(samples.last().unwrap().x, 0.002, 1e-9));
        assert!(samples.len() >= 5);
    }
}
