use ahash::AHashMap as HashMap;
use ahash::AHashSet as HashSet;
use delaunator::{EMPTY, Point as DPoint, triangulate};
use geo::{Area, ConvexHull};
use geo_types::{Coord, LineString, MultiPoint, Point, Polygon};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, info};

use crate::claims::{Claim, ClaimStore};
use crate::config::EngineConfig;
use crate::output::BeaconHull;
use crate::projection::{GeoProjection, planar_distance};

/// Hulls with less area than this (km²) are treated as degenerate.
const MIN_HULL_AREA: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HullKind {
    Concave,
    /// Concave construction failed; this is the convex hull of the same beacons.
    Convex,
}

/// Boundary half-edge of the triangulation, ordered longest first.
#[derive(Debug, Clone, Copy)]
struct BoundaryEdge {
    half_edge: usize,
    length: f64,
}

impl PartialEq for BoundaryEdge {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for BoundaryEdge {}
impl PartialOrd for BoundaryEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for BoundaryEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.length
            .total_cmp(&other.length)
            .then_with(|| self.half_edge.cmp(&other.half_edge))
    }
}

/// Chi-shape concave hull of planar points.
///
/// Starts from the Delaunay convex hull and repeatedly erodes the longest boundary edge
/// while it exceeds `max_edge`, as long as removing its triangle keeps the boundary a
/// single simple ring. Returns `None` when no usable ring can be traced.
pub fn chi_shape(points: &[Coord<f64>], max_edge: f64) -> Option<Polygon<f64>> {
    let points = dedup_points(points);
    if points.len() < 3 {
        return None;
    }

    let d_points: Vec<DPoint> = points.iter().map(|p| DPoint { x: p.x, y: p.y }).collect();
    let triangulation = triangulate(&d_points);
    let num_triangles = triangulation.triangles.len() / 3;
    if num_triangles == 0 {
        // collinear input
        return None;
    }

    let edge_length = |half_edge: usize| -> f64 {
        let start = triangulation.triangles[half_edge];
        let end = triangulation.triangles[delaunator::next_halfedge(half_edge)];
        planar_distance(points[start], points[end])
    };

    let mut boundary = HashSet::new();
    let mut boundary_degree = vec![0usize; points.len()];
    let mut heap = BinaryHeap::new();

    let add_boundary = |half_edge: usize,
                        boundary: &mut HashSet<usize>,
                        degree: &mut [usize],
                        heap: &mut BinaryHeap<BoundaryEdge>| {
        boundary.insert(half_edge);
        degree[triangulation.triangles[half_edge]] += 1;
        degree[triangulation.triangles[delaunator::next_halfedge(half_edge)]] += 1;
        heap.push(BoundaryEdge {
            half_edge,
            length: edge_length(half_edge),
        });
    };

    for e in 0..triangulation.halfedges.len() {
        if triangulation.halfedges[e] == EMPTY {
            add_boundary(e, &mut boundary, &mut boundary_degree, &mut heap);
        }
    }

    let mut removed = vec![false; num_triangles];

    while let Some(edge) = heap.pop() {
        if !boundary.contains(&edge.half_edge) {
            continue;
        }
        if edge.length <= max_edge {
            break;
        }

        let triangle = edge.half_edge / 3;
        if removed[triangle] {
            continue;
        }

        let e_next = delaunator::next_halfedge(edge.half_edge);
        let e_prev = delaunator::prev_halfedge(edge.half_edge);

        // a triangle with a second boundary edge is an ear; dropping it would not erode inward
        if boundary.contains(&e_next) || boundary.contains(&e_prev) {
            continue;
        }
        // the opposite vertex already on the boundary would pinch the ring
        let apex = triangulation.triangles[e_prev];
        if boundary_degree[apex] > 0 {
            continue;
        }

        removed[triangle] = true;
        boundary.remove(&edge.half_edge);
        boundary_degree[triangulation.triangles[edge.half_edge]] -= 1;
        boundary_degree[triangulation.triangles[e_next]] -= 1;

        for inner in [e_next, e_prev] {
            let opposite = triangulation.halfedges[inner];
            if opposite != EMPTY {
                add_boundary(opposite, &mut boundary, &mut boundary_degree, &mut heap);
            }
        }
    }

    let mut next_vertex = HashMap::new();
    for &e in &boundary {
        let start = triangulation.triangles[e];
        let end = triangulation.triangles[delaunator::next_halfedge(e)];
        if next_vertex.insert(start, end).is_some() {
            // two edges leave one vertex: the ring is pinched
            return None;
        }
    }

    // lowest vertex index, so the same beacons always trace the same ring
    let start = *next_vertex.keys().min()?;
    let mut current = start;
    let mut ring = Vec::with_capacity(next_vertex.len() + 1);
    loop {
        ring.push(points[current]);
        let next = *next_vertex.get(&current)?;
        if next == start {
            break;
        }
        if ring.len() > points.len() {
            return None;
        }
        current = next;
    }
    // a ring that skips boundary edges means the boundary split into several loops
    if ring.len() != next_vertex.len() {
        return None;
    }

    let polygon = Polygon::new(LineString::new(ring), vec![]);
    (polygon.unsigned_area() > MIN_HULL_AREA).then_some(polygon)
}

/// Convex hull of the points, `None` when they are collinear or coincide.
pub fn convex_hull(points: &[Coord<f64>]) -> Option<Polygon<f64>> {
    let points = dedup_points(points);
    if points.len() < 3 {
        return None;
    }
    let hull = MultiPoint::new(points.into_iter().map(Point::from).collect()).convex_hull();
    (hull.unsigned_area() > MIN_HULL_AREA).then_some(hull)
}

/// Concave hull with convex fallback.
pub fn beacon_hull(points: &[Coord<f64>], max_edge: f64) -> Option<(Polygon<f64>, HullKind)> {
    or_convex(points, chi_shape(points, max_edge))
}

fn or_convex(
    points: &[Coord<f64>],
    concave: Option<Polygon<f64>>,
) -> Option<(Polygon<f64>, HullKind)> {
    if let Some(polygon) = concave {
        return Some((polygon, HullKind::Concave));
    }
    debug!(points = points.len(), "concave hull failed, falling back to convex");
    convex_hull(points).map(|polygon| (polygon, HullKind::Convex))
}

fn dedup_points(points: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut unique = points.to_vec();
    unique.sort_by(|a, b| a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y)));
    unique.dedup_by(|a, b| (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);
    unique
}

/// Builds one connected territory per owner from that owner's beacons.
#[derive(Debug, Clone)]
pub struct HullBuilder<'a> {
    config: &'a EngineConfig,
}

impl<'a> HullBuilder<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, store: &ClaimStore) -> Vec<BeaconHull> {
        let groups = store.beacons_by_owner();
        let hulls: Vec<BeaconHull> = groups
            .par_iter()
            .filter(|(_, beacons)| beacons.len() >= self.config.min_beacons)
            .filter_map(|(owner_id, beacons)| {
                let hull = self.owner_hull(beacons);
                if hull.is_none() {
                    debug!(%owner_id, beacons = beacons.len(), "beacons form no hull this pass");
                }
                hull.map(|(polygon, kind)| {
                    BeaconHull::from_geographic(
                        (*owner_id).clone(),
                        &polygon,
                        beacons.iter().map(|b| b.id).collect(),
                        kind,
                    )
                })
            })
            .collect();

        info!(owners = groups.len(), hulls = hulls.len(), "built beacon hulls");
        hulls
    }

    /// Hull of one owner's beacons, in (lng, lat) order.
    fn owner_hull(&self, beacons: &[&Claim]) -> Option<(Polygon<f64>, HullKind)> {
        let projection = GeoProjection::centered_on(beacons.iter().map(|b| b.center))?;
        let points: Vec<Coord<f64>> = beacons
            .iter()
            .map(|b| projection.project(b.center))
            .collect();
        let (polygon, kind) = beacon_hull(&points, self.config.hull_max_edge_km)?;
        let geographic = polygon.exterior().coords().map(|c| projection.unproject_coord(*c));
        Some((Polygon::new(geographic.collect(), vec![]), kind))
    }
}
