//! Areal geometry helpers: conversion, merging, validation and repair.

use geo::algorithm::line_intersection::LineIntersection;
use geo::algorithm::sweep::{Cross, Intersections};
use geo::{
    unary_union, Area, BooleanOps, Coord, Geometry, Line, LineString, MultiPolygon, Polygon,
    Validation, Winding,
};
use hashbrown::HashMap;

/// Flatten an areal geometry into a MultiPolygon. Returns `None` for
/// geometries that have no area (points, lines).
pub fn to_multi_polygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Some(mp),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let mut polygons: Vec<Polygon<f64>> = Vec::new();
            for g in gc {
                polygons.extend(to_multi_polygon(g)?);
            }
            Some(MultiPolygon::new(polygons))
        }
        _ => None,
    }
}

/// Union all parts into one shape.
pub fn merge(parts: &[MultiPolygon<f64>]) -> MultiPolygon<f64> {
    unary_union(parts.iter().flat_map(|mp| mp.0.iter()))
}

/// Rebuild the shape's topology.
///
/// Every ring is cut into simple loops wherever it touches or crosses
/// itself. All loops of a shell are land, so no lobe of a twisted ring is
/// lost; loops of a hole are cut out of their polygon. Overlapping parts are
/// then merged.
pub fn repair(shape: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let parts: Vec<MultiPolygon<f64>> = shape.iter().map(repair_polygon).collect();
    merge(&parts)
}

fn repair_polygon(polygon: &Polygon<f64>) -> MultiPolygon<f64> {
    let shell = simple_loops(polygon.exterior());
    let land = unary_union(shell.iter());
    let holes: Vec<Polygon<f64>> = polygon.interiors().iter().flat_map(simple_loops).collect();
    if holes.is_empty() {
        return land;
    }
    land.difference(&unary_union(holes.iter()))
}

/// Return the shape if valid, otherwise one repair attempt. On failure the
/// error explains what is still wrong.
pub fn ensure_valid(shape: MultiPolygon<f64>) -> Result<MultiPolygon<f64>, String> {
    if shape.is_valid() {
        return Ok(shape);
    }
    let repaired = repair(&shape);
    match repaired.check_validation() {
        Ok(()) => Ok(repaired),
        Err(e) => Err(e.to_string()),
    }
}

/// Same outcome as [`ensure_valid`] for shapes that were valid before some
/// continuous transformation, but the full validity check only runs when
/// [`has_crossings`] finds something.
pub fn ensure_valid_screened(shape: MultiPolygon<f64>) -> Result<MultiPolygon<f64>, String> {
    if !has_crossings(&shape) {
        return Ok(shape);
    }
    let repaired = repair(&shape);
    if !has_crossings(&repaired) {
        return Ok(repaired);
    }
    match repaired.check_validation() {
        Ok(()) => Ok(repaired),
        Err(e) => Err(e.to_string()),
    }
}

/// Sweep-line screen for the defects a projection can introduce: rings that
/// are open, degenerate or non-finite, and edges meeting anywhere other than
/// the shared corner of two consecutive edges of one ring. Touching parts
/// also count, so `false` means the shape is certainly free of crossings.
pub fn has_crossings(shape: &MultiPolygon<f64>) -> bool {
    let mut edges = Vec::new();
    let rings = shape
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()));
    for (ring, line_string) in rings.enumerate() {
        match clean_ring(line_string) {
            Some(coords) => ring_edges(ring, &coords, &mut edges),
            None => return true,
        }
    }

    Intersections::from_iter(edges).any(|(a, b, hit)| match hit {
        LineIntersection::SinglePoint {
            is_proper: false, ..
        } => !a.follows(&b),
        _ => true,
    })
}

/// One edge of one ring, tagged so a crossing can be traced back to it.
#[derive(Debug, Clone, Copy)]
struct RingEdge {
    ring: usize,
    index: usize,
    /// Edge count of the ring
    count: usize,
    line: Line<f64>,
}

impl RingEdge {
    /// Consecutive edges of the same ring, including last-to-first.
    fn follows(&self, other: &RingEdge) -> bool {
        if self.ring != other.ring {
            return false;
        }
        let gap = self.index.abs_diff(other.index);
        gap == 1 || gap + 1 == self.count
    }
}

impl Cross for RingEdge {
    type Scalar = f64;

    fn line(&self) -> Line<f64> {
        self.line
    }
}

/// Ring coordinates with consecutive repeats removed. `None` if the ring is
/// not closed, has fewer than three corners or a non-finite coordinate.
fn clean_ring(ring: &LineString<f64>) -> Option<Vec<Coord<f64>>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for c in ring.coords() {
        if !(c.x.is_finite() && c.y.is_finite()) {
            return None;
        }
        if coords.last() != Some(c) {
            coords.push(*c);
        }
    }
    if coords.len() < 4 || coords.first() != coords.last() {
        return None;
    }
    Some(coords)
}

fn ring_edges(ring: usize, coords: &[Coord<f64>], out: &mut Vec<RingEdge>) {
    let count = coords.len() - 1;
    out.extend(coords.windows(2).enumerate().map(|(index, w)| RingEdge {
        ring,
        index,
        count,
        line: Line::new(w[0], w[1]),
    }));
}

/// Split one ring into counter-clockwise simple loops with positive area.
fn simple_loops(ring: &LineString<f64>) -> Vec<Polygon<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len() + 1);
    for c in ring.coords() {
        if c.x.is_finite() && c.y.is_finite() && coords.last() != Some(c) {
            coords.push(*c);
        }
    }
    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if first != last {
            coords.push(first);
        }
    }
    if coords.len() < 4 {
        return Vec::new();
    }

    split_loops(&node_ring(&coords))
        .into_iter()
        .filter_map(|mut line_string| {
            line_string.make_ccw_winding();
            let polygon = Polygon::new(line_string, vec![]);
            (polygon.unsigned_area() > 0.0).then_some(polygon)
        })
        .collect()
}

/// Insert every point where the closed ring `coords` meets itself as an
/// extra vertex on each edge involved.
fn node_ring(coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut edges = Vec::with_capacity(coords.len());
    ring_edges(0, coords, &mut edges);

    let mut cuts: Vec<Vec<Coord<f64>>> = vec![Vec::new(); edges.len()];
    for (a, b, hit) in Intersections::from_iter(edges) {
        let points = match hit {
            LineIntersection::SinglePoint { intersection, .. } => [intersection, intersection],
            LineIntersection::Collinear { intersection } => [intersection.start, intersection.end],
        };
        for p in points {
            cuts[a.index].push(p);
            cuts[b.index].push(p);
        }
    }

    let mut noded = Vec::with_capacity(coords.len());
    for (w, cut) in coords.windows(2).zip(cuts.iter_mut()) {
        let (start, end) = (w[0], w[1]);
        noded.push(start);
        cut.retain(|p| *p != start && *p != end);
        cut.sort_by(|p, q| dist2(start, *p).total_cmp(&dist2(start, *q)));
        cut.dedup();
        noded.extend(cut.iter().copied());
    }
    noded.push(coords[coords.len() - 1]);
    noded
}

fn dist2(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).powi(2) + (a.y - b.y).powi(2)
}

/// Walk a noded closed ring and peel off a loop every time a vertex repeats.
fn split_loops(noded: &[Coord<f64>]) -> Vec<LineString<f64>> {
    // +0.0 folds negative zero into positive zero
    let key = |c: &Coord<f64>| ((c.x + 0.0).to_bits(), (c.y + 0.0).to_bits());

    let mut loops = Vec::new();
    let mut path: Vec<Coord<f64>> = Vec::with_capacity(noded.len());
    let mut seen: HashMap<(u64, u64), usize> = HashMap::with_capacity(noded.len());

    for c in noded {
        let repeat = seen.get(&key(c)).copied();
        match repeat {
            Some(at) => {
                let mut closed: Vec<Coord<f64>> = path.drain(at..).collect();
                for p in &closed[1..] {
                    seen.remove(&key(p));
                }
                closed.push(*c);
                path.push(*c);
                loops.push(LineString::new(closed));
            }
            None => {
                seen.insert(key(c), path.len());
                path.push(*c);
            }
        }
    }
    loops
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon, Point};

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]
    }

    fn bowtie() -> MultiPolygon<f64> {
        // Self-intersecting ring crossing at (1, 1).
        MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![
                coord! { x: 0.0, y: 0.0 },
                coord! { x: 2.0, y: 2.0 },
                coord! { x: 2.0, y: 0.0 },
                coord! { x: 0.0, y: 2.0 },
                coord! { x: 0.0, y: 0.0 },
            ]),
            vec![],
        )])
    }

    /// Regular polygon with `n` corners, optionally with a square hole.
    fn circle(n: usize, hole: bool) -> MultiPolygon<f64> {
        let ring: Vec<Coord<f64>> = (0..=n)
            .map(|i| {
                let t = (i % n) as f64 / n as f64 * std::f64::consts::TAU;
                coord! { x: 10.0 * t.cos(), y: 10.0 * t.sin() }
            })
            .collect();
        let interiors = if hole {
            vec![square(-1.0, -1.0, 2.0).exterior().clone()]
        } else {
            vec![]
        };
        MultiPolygon::new(vec![Polygon::new(LineString::new(ring), interiors)])
    }

    #[test]
    fn test_rejects_non_areal() {
        assert!(to_multi_polygon(Geometry::Point(Point::new(1.0, 2.0))).is_none());
        let collection = Geometry::GeometryCollection(geo::GeometryCollection::new_from(vec![
            Geometry::Polygon(square(0.0, 0.0, 1.0)),
            Geometry::Point(Point::new(1.0, 2.0)),
        ]));
        assert!(to_multi_polygon(collection).is_none());
    }

    #[test]
    fn test_merge_overlapping_squares() {
        let a = MultiPolygon::new(vec![square(0.0, 0.0, 2.0)]);
        let b = MultiPolygon::new(vec![square(1.0, 1.0, 2.0)]);
        let merged = merge(&[a, b]);
        assert_eq!(merged.0.len(), 1);
        assert!((merged.unsigned_area() - 7.0).abs() < 1e-9);
        assert!(merged.is_valid());
    }

    #[test]
    fn test_repairs_bowtie() {
        let shape = bowtie();
        assert!(!shape.is_valid());

        let fixed = ensure_valid(shape).unwrap();
        assert!(fixed.is_valid());
        assert!((fixed.unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_repair_keeps_holes() {
        let mut shape = circle(64, true);
        let expected = shape.unsigned_area();
        // Reverse the shell so the ring orientation is wrong as well.
        shape.0[0].exterior_mut(|ring| ring.0.reverse());

        let fixed = repair(&shape);
        assert!(fixed.is_valid());
        assert_eq!(fixed.0.len(), 1);
        assert_eq!(fixed.0[0].interiors().len(), 1);
        assert!((fixed.unsigned_area() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_split_loops_figure_eight() {
        let noded = [
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
            coord! { x: 2.0, y: 2.0 },
            coord! { x: 2.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
            coord! { x: 0.0, y: 2.0 },
            coord! { x: 0.0, y: 0.0 },
        ];
        let loops = split_loops(&noded);
        assert_eq!(loops.len(), 2);
        assert!(loops.iter().all(|l| l.0.len() == 4 && l.is_closed()));
    }

    #[test]
    fn test_screen_flags_crossings() {
        assert!(has_crossings(&bowtie()));

        // Two squares sharing an edge touch, which the screen reports.
        let touching = MultiPolygon::new(vec![square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0)]);
        assert!(has_crossings(&touching));

        let open = MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, f64::NAN), (0.0, 0.0)]),
            vec![],
        )]);
        assert!(has_crossings(&open));
    }

    #[test]
    fn test_screen_passes_clean_shapes() {
        assert!(!has_crossings(&circle(12, true)));
        let apart = MultiPolygon::new(vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]);
        assert!(!has_crossings(&apart));
        assert!(!has_crossings(&MultiPolygon::new(vec![])));
    }

    #[test]
    fn test_screened_validation_on_many_vertices() {
        // Far beyond what a pairwise segment check handles quickly in a
        // debug build.
        let shape = circle(50_000, true);
        let checked = ensure_valid_screened(shape.clone()).unwrap();
        assert_eq!(checked, shape);

        let fixed = ensure_valid_screened(bowtie()).unwrap();
        assert!((fixed.unsigned_area() - 2.0).abs() < 1e-9);
    }
}
