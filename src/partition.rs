//! Exclusive per-claim regions from a power diagram of claim circles.
//!
//! Each claim starts from its own circle and is cut by the radical axis of every
//! overlapping negotiable neighbour. Walls (custom boundaries, and absolute NPC circles
//! facing negotiable claims) are subtracted whole instead. Claims are processed
//! independently, so the pass runs in parallel.

use geo::{Area, BooleanOps, BoundingRect, CoordsIter, Intersects};
use geo_types::{Coord, LineString, MultiPolygon, Polygon, Rect};
use rayon::prelude::*;
use rstar::RTree;
use rstar::primitives::GeomWithData;
use tracing::{debug, info, warn};

use crate::claims::{Claim, ClaimShape, ClaimStore};
use crate::config::{CoincidentPolicy, EngineConfig};
use crate::output::PartitionedRegion;
use crate::projection::{GeoProjection, planar_distance, split_at_antimeridian};

/// Tolerance for near-zero distances and determinants in the projected plane (km).
pub const EPSILON: f64 = 1e-9;

/// Pieces smaller than this (km²) are clipping noise and are dropped.
const SLIVER_AREA: f64 = 1e-9;

/// Line of equal power with respect to two circles.
///
/// Stored relative to the first circle: `offset` is the distance from its centre to the
/// axis along the unit `direction` towards the second centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadicalAxis {
    origin: Coord<f64>,
    direction: Coord<f64>,
    offset: f64,
}

impl RadicalAxis {
    /// `None` when the centres coincide and no axis exists.
    pub fn between(c: Coord<f64>, rc: f64, n: Coord<f64>, rn: f64) -> Option<Self> {
        let d = planar_distance(c, n);
        if d < EPSILON {
            return None;
        }
        Some(Self {
            origin: c,
            direction: Coord {
                x: (n.x - c.x) / d,
                y: (n.y - c.y) / d,
            },
            offset: (d * d + rc * rc - rn * rn) / (2.0 * d),
        })
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Where the axis crosses the centre-to-centre line.
    pub fn foot(&self) -> Coord<f64> {
        self.origin + self.direction * self.offset
    }

    /// Negative on the first circle's side, positive on the second's.
    pub fn signed_distance(&self, p: Coord<f64>) -> f64 {
        let v = p - self.origin;
        v.x * self.direction.x + v.y * self.direction.y - self.offset
    }

    /// The first circle's side as a quad large enough to cover `bounds`.
    pub fn half_plane(&self, bounds: Rect<f64>) -> Polygon<f64> {
        let foot = self.foot();
        let reach = [
            bounds.min(),
            bounds.max(),
            Coord {
                x: bounds.min().x,
                y: bounds.max().y,
            },
            Coord {
                x: bounds.max().x,
                y: bounds.min().y,
            },
        ]
        .into_iter()
        .map(|corner| planar_distance(foot, corner))
        .fold(0.0, f64::max)
            + 1.0;

        let left = Coord {
            x: -self.direction.y,
            y: self.direction.x,
        } * reach;
        let back = self.direction * (-reach);
        Polygon::new(
            LineString::new(vec![
                foot - left,
                foot + left,
                foot + left + back,
                foot - left + back,
            ]),
            vec![],
        )
    }
}

/// Power of a point with respect to a circle.
pub fn power(p: Coord<f64>, center: Coord<f64>, radius: f64) -> f64 {
    let d = planar_distance(p, center);
    d * d - radius * radius
}

/// Regular polygon approximation of a circle.
pub fn circle_polygon(center: Coord<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    let ring = (0..segments)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / segments as f64;
            Coord {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            }
        })
        .collect::<Vec<_>>();
    Polygon::new(LineString::new(ring), vec![])
}

/// What a neighbour does to a claim's region.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Boundary {
    /// The neighbour leaves the region alone.
    Ignore,
    /// Keep only the claim's side of the axis.
    Axis(RadicalAxis),
    /// Remove the neighbour's whole shape.
    Wall,
}

/// A claim in the pass's projected frame.
#[derive(Debug, Clone)]
struct ProjectedClaim<'a> {
    claim: &'a Claim,
    center: Coord<f64>,
    /// Radius of the smallest circle around `center` enclosing the shape.
    reach: f64,
    shape: Polygon<f64>,
}

impl<'a> ProjectedClaim<'a> {
    fn new(claim: &'a Claim, projection: &GeoProjection, segments: usize) -> Self {
        let center = projection.project(claim.center);
        match &claim.shape {
            ClaimShape::Circular => Self {
                claim,
                center,
                reach: claim.radius_km,
                shape: circle_polygon(center, claim.radius_km, segments),
            },
            ClaimShape::Polygonal(boundary) => {
                let shape = projection.project_polygon(boundary);
                let reach = shape
                    .exterior()
                    .coords()
                    .map(|c| planar_distance(center, *c))
                    .fold(0.0, f64::max);
                Self {
                    claim,
                    center,
                    reach,
                    shape,
                }
            }
        }
    }

    fn has_area(&self) -> bool {
        self.reach > EPSILON
    }
}

pub struct RadicalAxisPartitioner<'a> {
    config: &'a EngineConfig,
}

impl<'a> RadicalAxisPartitioner<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// One region per valid claim, in store order.
    pub fn partition(&self, store: &ClaimStore) -> Vec<PartitionedRegion> {
        let Some(projection) = GeoProjection::centered_on(store.claims().iter().map(|c| c.center))
        else {
            return Vec::new();
        };

        let projected: Vec<ProjectedClaim<'_>> = store
            .claims()
            .iter()
            .map(|claim| ProjectedClaim::new(claim, &projection, self.config.circle_segments))
            .collect();

        let max_reach = projected.iter().map(|p| p.reach).fold(0.0, f64::max);
        let index = RTree::bulk_load(
            projected
                .iter()
                .enumerate()
                .map(|(i, p)| GeomWithData::new([p.center.x, p.center.y], i))
                .collect(),
        );

        let regions: Vec<PartitionedRegion> = projected
            .par_iter()
            .enumerate()
            .map(|(i, claim)| {
                let neighbours = neighbours_of(i, &projected, &index, max_reach);
                let region = self.exclusive_region(claim, &neighbours);
                PartitionedRegion::from_geographic(
                    claim.claim.id,
                    claim.claim.owner_id.clone(),
                    &split_at_antimeridian(projection.unproject_multi_polygon(&region)),
                )
            })
            .collect();

        let subsumed = regions.iter().filter(|r| r.is_subsumed()).count();
        info!(
            claims = regions.len(),
            subsumed,
            rejected = store.rejected().len(),
            "partitioned claims"
        );
        regions
    }

    fn exclusive_region(
        &self,
        claim: &ProjectedClaim<'_>,
        neighbours: &[&ProjectedClaim<'_>],
    ) -> MultiPolygon<f64> {
        if !claim.has_area() {
            return MultiPolygon::new(vec![]);
        }
        let mut region = MultiPolygon::new(vec![claim.shape.clone()]);
        // walls are never negotiated down
        if claim.claim.is_wall() {
            return region;
        }

        for neighbour in neighbours {
            if region.0.is_empty() {
                break;
            }
            region = match self.boundary_between(claim, neighbour) {
                Boundary::Ignore => region,
                Boundary::Axis(axis) => clip_to_axis(region, &axis, claim, neighbour),
                Boundary::Wall => subtract_wall(region, &neighbour.shape, claim, neighbour),
            };
        }
        region
    }

    fn boundary_between(
        &self,
        claim: &ProjectedClaim<'_>,
        neighbour: &ProjectedClaim<'_>,
    ) -> Boundary {
        if neighbour.claim.is_wall() {
            return Boundary::Wall;
        }
        match (
            claim.claim.faction.is_negotiable(),
            neighbour.claim.faction.is_negotiable(),
        ) {
            (true, false) => return Boundary::Wall,
            (false, true) => return Boundary::Ignore,
            _ => {}
        }

        match RadicalAxis::between(claim.center, claim.reach, neighbour.center, neighbour.reach) {
            Some(axis) => Boundary::Axis(axis),
            None => match self.config.coincident_policy {
                CoincidentPolicy::LowerIdWins if neighbour.claim.id < claim.claim.id => {
                    Boundary::Wall
                }
                _ => {
                    debug!(
                        claim_id = claim.claim.id,
                        neighbour_id = neighbour.claim.id,
                        "coincident centres, leaving pair unclipped"
                    );
                    Boundary::Ignore
                }
            },
        }
    }
}

/// Other claims whose reach overlaps this one's, sorted by store index.
fn neighbours_of<'p, 'a>(
    i: usize,
    projected: &'p [ProjectedClaim<'a>],
    index: &RTree<GeomWithData<[f64; 2], usize>>,
    max_reach: f64,
) -> Vec<&'p ProjectedClaim<'a>> {
    let claim = &projected[i];
    let search = claim.reach + max_reach;
    let mut found: Vec<usize> = index
        .locate_within_distance([claim.center.x, claim.center.y], search * search)
        .map(|entry| entry.data)
        .filter(|&j| j != i)
        .filter(|&j| {
            let other = &projected[j];
            other.has_area()
                && planar_distance(claim.center, other.center) < claim.reach + other.reach
        })
        .collect();
    found.sort_unstable();
    found.into_iter().map(|j| &projected[j]).collect()
}

fn clip_to_axis(
    region: MultiPolygon<f64>,
    axis: &RadicalAxis,
    claim: &ProjectedClaim<'_>,
    neighbour: &ProjectedClaim<'_>,
) -> MultiPolygon<f64> {
    let (mut inside, mut outside) = (false, false);
    for c in region.coords_iter() {
        let s = axis.signed_distance(c);
        inside |= s < -EPSILON;
        outside |= s > EPSILON;
    }
    if !outside {
        return region;
    }
    if !inside {
        return MultiPolygon::new(vec![]);
    }

    let Some(bounds) = region.bounding_rect() else {
        return region;
    };
    let half_plane = MultiPolygon::new(vec![axis.half_plane(bounds)]);
    let clipped = region.intersection(&half_plane);
    accept_clip(region, clipped, claim, neighbour)
}

fn subtract_wall(
    region: MultiPolygon<f64>,
    wall: &Polygon<f64>,
    claim: &ProjectedClaim<'_>,
    neighbour: &ProjectedClaim<'_>,
) -> MultiPolygon<f64> {
    let overlaps = match (region.bounding_rect(), wall.bounding_rect()) {
        (Some(a), Some(b)) => a.intersects(&b),
        _ => false,
    };
    if !overlaps {
        return region;
    }
    let clipped = region.difference(&MultiPolygon::new(vec![wall.clone()]));
    accept_clip(region, clipped, claim, neighbour)
}

/// Keep a clip result only if it is numerically sound; otherwise the neighbour is skipped
/// and the region stays as it was before this pair.
fn accept_clip(
    before: MultiPolygon<f64>,
    clipped: MultiPolygon<f64>,
    claim: &ProjectedClaim<'_>,
    neighbour: &ProjectedClaim<'_>,
) -> MultiPolygon<f64> {
    let finite = clipped.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite());
    let before_area = before.unsigned_area();
    let grew = clipped.unsigned_area() > before_area * (1.0 + 1e-6) + SLIVER_AREA;

    if !finite || grew {
        warn!(
            claim_id = claim.claim.id,
            neighbour_id = neighbour.claim.id,
            finite,
            grew,
            "clip failed, keeping region unclipped for this neighbour"
        );
        return before;
    }

    MultiPolygon::new(
        clipped
            .0
            .into_iter()
            .filter(|piece| piece.unsigned_area() > SLIVER_AREA)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{FactionKind, TerritoryClaim};
    use crate::projection::LatLng;
    use geo::Contains;

    fn partition(records: Vec<TerritoryClaim>) -> Vec<PartitionedRegion> {
        let config = EngineConfig::default();
        RadicalAxisPartitioner::new(&config).partition(&ClaimStore::from_records(records, &config))
    }

    fn region_of(regions: &[PartitionedRegion], id: i64) -> &PartitionedRegion {
        regions.iter().find(|r| r.claim_id == id).unwrap()
    }

    #[test]
    fn radical_axis_has_equal_power() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 7.0, y: 2.0 };
        let (ra, rb) = (5.0, 3.0);
        let axis = RadicalAxis::between(a, ra, b, rb).unwrap();
        let foot = axis.foot();
        assert!((power(foot, a, ra) - power(foot, b, rb)).abs() < 1e-9);
        assert!(axis.signed_distance(a) < 0.0);
        assert!(axis.signed_distance(b) > 0.0);
    }

    #[test]
    fn equal_radii_split_at_midpoint() {
        let (a, b) = (Coord { x: 0.0, y: 0.0 }, Coord { x: 4.0, y: 0.0 });
        let axis = RadicalAxis::between(a, 5.0, b, 5.0).unwrap();
        assert!((axis.offset() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn coincident_centres_have_no_axis() {
        let c = Coord { x: 1.0, y: 1.0 };
        assert!(RadicalAxis::between(c, 5.0, c, 3.0).is_none());
    }

    #[test]
    fn half_plane_covers_the_near_side() {
        let (a, b) = (Coord { x: 0.0, y: 0.0 }, Coord { x: 4.0, y: 0.0 });
        let axis = RadicalAxis::between(a, 5.0, b, 5.0).unwrap();
        let bounds = Rect::new(Coord { x: -5.0, y: -5.0 }, Coord { x: 5.0, y: 5.0 });
        let half = axis.half_plane(bounds);
        assert!(half.contains(&Coord { x: -4.9, y: 4.9 }));
        assert!(half.contains(&Coord { x: 1.9, y: -4.9 }));
        assert!(!half.contains(&Coord { x: 2.1, y: 0.0 }));
    }

    #[test]
    fn isolated_claim_keeps_its_circle() {
        let regions = partition(vec![
            TerritoryClaim::circle(1, "red", LatLng::new(10.0, 10.0), 5.0),
            TerritoryClaim::circle(2, "blue", LatLng::new(11.0, 11.0), 5.0),
        ]);
        let region = region_of(&regions, 1);
        assert_eq!(region.polygons.len(), 1);
        assert_eq!(region.polygons[0].exterior.len(), 65);
    }

    #[test]
    fn overlapping_circles_stop_short_of_each_other() {
        let regions = partition(vec![
            TerritoryClaim::circle(1, "red", LatLng::new(37.50, 127.00), 5.0),
            TerritoryClaim::circle(2, "blue", LatLng::new(37.52, 127.00), 5.0),
        ]);
        let a = region_of(&regions, 1);
        let b = region_of(&regions, 2);
        let max_a = a.rings().flatten().map(|[lat, _]| *lat).fold(f64::MIN, f64::max);
        let min_b = b.rings().flatten().map(|[lat, _]| *lat).fold(f64::MAX, f64::min);
        assert!(max_a < 37.5101 && max_a > 37.5099, "a stops at {max_a}");
        assert!(min_b > 37.5099 && min_b < 37.5101, "b starts at {min_b}");
    }

    #[test]
    fn small_circle_inside_big_one_is_subsumed() {
        // power of the small circle exceeds the big one's everywhere inside it
        let regions = partition(vec![
            TerritoryClaim::circle(1, "red", LatLng::new(37.50, 127.00), 20.0),
            TerritoryClaim::circle(2, "blue", LatLng::new(37.51, 127.00), 1.0),
        ]);
        assert!(region_of(&regions, 2).is_subsumed());
        assert!(!region_of(&regions, 1).is_subsumed());
    }

    #[test]
    fn absolute_npc_circle_wins_against_players() {
        let regions = partition(vec![
            TerritoryClaim::circle(1, "red", LatLng::new(37.50, 127.00), 5.0),
            TerritoryClaim::circle(2, "city", LatLng::new(37.52, 127.00), 2.0)
                .with_faction(FactionKind::AbsoluteNpc),
        ]);
        let city = region_of(&regions, 2);
        assert_eq!(city.polygons[0].exterior.len(), 65);
        let player = region_of(&regions, 1).to_multi_polygon();
        let city_shape = city.to_multi_polygon();
        assert!(player.intersection(&city_shape).unsigned_area() < 1e-10);
    }

    #[test]
    fn claims_across_the_antimeridian_are_clipped() {
        let west = TerritoryClaim::circle(1, "red", LatLng::new(10.0, 179.99), 5.0);
        let east = TerritoryClaim::circle(2, "blue", LatLng::new(10.0, -179.99), 5.0);
        let alone = partition(vec![west.clone()]);
        let full = region_of(&alone, 1).to_multi_polygon().unsigned_area();

        let regions = partition(vec![west, east]);
        for id in [1, 2] {
            let shape = region_of(&regions, id).to_multi_polygon();
            let area = shape.unsigned_area();
            assert!(area > 0.4 * full && area < 0.6 * full, "claim {id} kept {area} of {full}");
            let bounds = shape.bounding_rect().unwrap();
            assert!(bounds.min().x >= -180.0 && bounds.max().x <= 180.0);
        }
        let a = region_of(&regions, 1).to_multi_polygon();
        let b = region_of(&regions, 2).to_multi_polygon();
        assert!(a.contains(&LatLng::new(10.0, 179.97).to_point()));
        assert!(b.contains(&LatLng::new(10.0, -179.97).to_point()));
        assert!(a.intersection(&b).unsigned_area() < 1e-10);
    }

    #[test]
    fn unsound_clip_keeps_the_previous_region() {
        let config = EngineConfig::default();
        let store = ClaimStore::from_records(
            vec![
                TerritoryClaim::circle(1, "red", LatLng::new(37.50, 127.00), 5.0),
                TerritoryClaim::circle(2, "blue", LatLng::new(37.52, 127.00), 5.0),
            ],
            &config,
        );
        let projection = GeoProjection::new(LatLng::new(37.51, 127.00));
        let claim = ProjectedClaim::new(&store.claims()[0], &projection, 64);
        let neighbour = ProjectedClaim::new(&store.claims()[1], &projection, 64);
        let square = |side: f64| {
            MultiPolygon::new(vec![
                Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: side, y: side }).to_polygon(),
            ])
        };

        // a clip can only remove area
        let grown = accept_clip(square(2.0), square(3.0), &claim, &neighbour);
        assert_eq!(grown, square(2.0));

        let mut broken = square(1.0);
        broken.0[0].exterior_mut(|ring| ring.0[1].x = f64::NAN);
        let kept = accept_clip(square(2.0), broken, &claim, &neighbour);
        assert_eq!(kept, square(2.0));

        let shrunk = accept_clip(square(2.0), square(1.0), &claim, &neighbour);
        assert_eq!(shrunk, square(1.0));
    }

    #[test]
    fn coincident_lower_id_wins_when_configured() {
        let config = EngineConfig {
            coincident_policy: CoincidentPolicy::LowerIdWins,
            ..Default::default()
        };
        let records = vec![
            TerritoryClaim::circle(1, "red", LatLng::new(37.5, 127.0), 5.0),
            TerritoryClaim::circle(2, "blue", LatLng::new(37.5, 127.0), 5.0),
        ];
        let regions = RadicalAxisPartitioner::new(&config)
            .partition(&ClaimStore::from_records(records.clone(), &config));
        assert!(!region_of(&regions, 1).is_subsumed());
        assert!(region_of(&regions, 2).is_subsumed());

        let skipped = partition(records);
        assert!(!region_of(&skipped, 1).is_subsumed());
        assert!(!region_of(&skipped, 2).is_subsumed());
    }

    #[test]
    fn wall_inside_circle_becomes_a_hole() {
        let wall = vec![
            LatLng::new(37.49, 126.99),
            LatLng::new(37.49, 127.01),
            LatLng::new(37.51, 127.01),
            LatLng::new(37.51, 126.99),
        ];
        let regions = partition(vec![
            TerritoryClaim::circle(1, "red", LatLng::new(37.50, 127.00), 10.0),
            TerritoryClaim::polygon(2, "city", LatLng::new(37.50, 127.00), wall),
        ]);
        let player = region_of(&regions, 1);
        assert_eq!(player.polygons.len(), 1);
        assert_eq!(player.polygons[0].holes.len(), 1);
        assert!(!player
            .to_multi_polygon()
            .contains(&LatLng::new(37.50, 127.00).to_point()));
    }

    #[test]
    fn empty_store_partitions_to_nothing() {
        let regions = partition(vec![]);
        assert!(regions.is_empty());
    }
}
