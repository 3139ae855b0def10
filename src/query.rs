use geo::{Distance, Haversine, Intersects};
use geo_types::MultiPolygon;
use tracing::{debug, warn};

use crate::claims::{Claim, ClaimId, ClaimShape, ClaimStore, OwnerId};
use crate::output::BeaconHull;
use crate::projection::LatLng;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Hull,
    Circle,
    Polygon,
}

/// What matched: an individual claim or an owner's beacon hull.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum MatchTarget {
    Claim(ClaimId),
    Hull(OwnerId),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub target: MatchTarget,
    pub owner_id: OwnerId,
    pub kind: MatchKind,
}

/// Inspection radius around the viewer, as configured by the game admin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRange {
    pub origin: LatLng,
    pub radius_km: f64,
}

impl ViewRange {
    pub fn covers(&self, point: LatLng) -> bool {
        Haversine.distance(self.origin.to_point(), point.to_point()) / 1000.0 <= self.radius_km
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryConfig {
    pub include_hulls: bool,
    pub view_range: Option<ViewRange>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            include_hulls: true,
            view_range: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub point: LatLng,
    /// Discovery order: hulls first, then claims in store order.
    pub matches: Vec<Match>,
    /// The point lies outside the configured view range and was not tested.
    pub out_of_view: bool,
}

impl QueryResult {
    fn empty(point: LatLng, out_of_view: bool) -> Self {
        Self {
            point,
            matches: Vec::new(),
            out_of_view,
        }
    }

    pub fn first(&self) -> Option<&Match> {
        self.matches.first()
    }

    /// More than one claim or hull covers the point.
    pub fn has_conflict(&self) -> bool {
        self.matches.len() > 1
    }

    pub fn is_neutral(&self) -> bool {
        self.matches.is_empty()
    }

    /// Distinct owners among the matches, in discovery order.
    pub fn owners(&self) -> Vec<&OwnerId> {
        let mut owners: Vec<&OwnerId> = Vec::new();
        for m in &self.matches {
            if !owners.contains(&&m.owner_id) {
                owners.push(&m.owner_id);
            }
        }
        owners
    }
}

/// Answers "who claims this point" straight from each claim's primitive.
///
/// Partitioned regions are deliberately not consulted: overlapping claims must all be
/// reported so the caller can surface the conflict.
#[derive(Debug, Clone)]
pub struct PointQueryService<'a> {
    claims: &'a [Claim],
    hulls: Vec<(&'a OwnerId, MultiPolygon<f64>)>,
    config: QueryConfig,
}

impl<'a> PointQueryService<'a> {
    pub fn new(store: &'a ClaimStore, hulls: &'a [BeaconHull], config: QueryConfig) -> Self {
        Self {
            claims: store.claims(),
            hulls: hulls.iter().map(|h| (&h.owner_id, h.to_multi_polygon())).collect(),
            config,
        }
    }

    pub fn query(&self, point: LatLng) -> QueryResult {
        if !point.is_finite() {
            warn!(?point, "ignoring non-finite query point");
            return QueryResult::empty(point, false);
        }
        if let Some(range) = &self.config.view_range {
            if !range.covers(point) {
                debug!(?point, "query point outside view range");
                return QueryResult::empty(point, true);
            }
        }

        let mut matches = Vec::new();
        if self.config.include_hulls {
            let target = point.to_point();
            for (owner_id, polygon) in &self.hulls {
                if polygon.intersects(&target) {
                    matches.push(Match {
                        target: MatchTarget::Hull((*owner_id).clone()),
                        owner_id: (*owner_id).clone(),
                        kind: MatchKind::Hull,
                    });
                }
            }
        }

        // beacons absorbed into a hull are still tested on their own
        for claim in self.claims.iter().filter(|c| c.contains(point)) {
            let kind = match claim.shape {
                ClaimShape::Circular => MatchKind::Circle,
                ClaimShape::Polygonal(_) => MatchKind::Polygon,
            };
            matches.push(Match {
                target: MatchTarget::Claim(claim.id),
                owner_id: claim.owner_id.clone(),
                kind,
            });
        }

        QueryResult {
            point,
            matches,
            out_of_view: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::TerritoryClaim;
    use crate::config::EngineConfig;
    use crate::hull::HullBuilder;

    fn store(records: Vec<TerritoryClaim>) -> ClaimStore {
        ClaimStore::from_records(records, &EngineConfig::default())
    }

    #[test]
    fn midpoint_of_overlap_is_a_conflict() {
        let store = store(vec![
            TerritoryClaim::circle(1, "red", LatLng::new(37.50, 127.00), 5.0),
            TerritoryClaim::circle(2, "blue", LatLng::new(37.52, 127.00), 5.0),
        ]);
        let service = PointQueryService::new(&store, &[], QueryConfig::default());

        let result = service.query(LatLng::new(37.51, 127.00));
        assert!(result.has_conflict());
        assert_eq!(
            result.matches.iter().map(|m| m.target.clone()).collect::<Vec<_>>(),
            vec![MatchTarget::Claim(1), MatchTarget::Claim(2)]
        );
        assert_eq!(result.owners().len(), 2);
        assert_eq!(result.first().unwrap().kind, MatchKind::Circle);
    }

    #[test]
    fn far_point_is_neutral() {
        let store = store(vec![TerritoryClaim::circle(
            1,
            "red",
            LatLng::new(37.50, 127.00),
            5.0,
        )]);
        let service = PointQueryService::new(&store, &[], QueryConfig::default());
        let result = service.query(LatLng::new(37.60, 127.00));
        assert!(result.is_neutral());
        assert!(!result.has_conflict());
        assert!(result.first().is_none());
    }

    #[test]
    fn polygon_claims_use_their_boundary() {
        let wall = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(1.0, 0.0),
        ];
        let store = store(vec![TerritoryClaim::polygon(
            1,
            "city",
            LatLng::new(0.5, 0.5),
            wall,
        )]);
        let service = PointQueryService::new(&store, &[], QueryConfig::default());
        let result = service.query(LatLng::new(0.9, 0.9));
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].kind, MatchKind::Polygon);
    }

    #[test]
    fn hulls_come_first_and_beacons_still_match() {
        let config = EngineConfig::default();
        let store = ClaimStore::from_records(
            vec![
                TerritoryClaim::circle(1, "red", LatLng::new(37.50, 127.00), 2.0).beacon(),
                TerritoryClaim::circle(2, "red", LatLng::new(37.55, 127.00), 2.0).beacon(),
                TerritoryClaim::circle(3, "red", LatLng::new(37.52, 127.06), 2.0).beacon(),
            ],
            &config,
        );
        let hulls = HullBuilder::new(&config).build(&store);
        let service = PointQueryService::new(&store, &hulls, QueryConfig::default());

        // inside the triangle but away from every beacon circle
        let interior = service.query(LatLng::new(37.523, 127.02));
        assert_eq!(interior.matches.len(), 1);
        assert_eq!(
            interior.matches[0].target,
            MatchTarget::Hull(OwnerId::from("red"))
        );

        // inside the hull and within beacon 1's circle
        let at_beacon = service.query(LatLng::new(37.5047, 127.004));
        assert_eq!(at_beacon.matches[0].kind, MatchKind::Hull);
        assert_eq!(at_beacon.matches[1].target, MatchTarget::Claim(1));

        let without_hulls = PointQueryService::new(
            &store,
            &hulls,
            QueryConfig {
                include_hulls: false,
                ..Default::default()
            },
        );
        assert!(without_hulls.query(LatLng::new(37.523, 127.02)).is_neutral());
    }

    #[test]
    fn hull_across_the_antimeridian_matches_both_sides() {
        let config = EngineConfig::default();
        let store = ClaimStore::from_records(
            vec![
                TerritoryClaim::circle(1, "red", LatLng::new(10.0, 179.9), 0.5).beacon(),
                TerritoryClaim::circle(2, "red", LatLng::new(10.3, 179.95), 0.5).beacon(),
                TerritoryClaim::circle(3, "red", LatLng::new(10.1, -179.85), 0.5).beacon(),
            ],
            &config,
        );
        let hulls = HullBuilder::new(&config).build(&store);
        assert_eq!(hulls.len(), 1);
        let service = PointQueryService::new(&store, &hulls, QueryConfig::default());

        for point in [LatLng::new(10.12, 179.99), LatLng::new(10.1, -179.95)] {
            let result = service.query(point);
            assert_eq!(result.matches.len(), 1, "{point:?}");
            assert_eq!(result.matches[0].kind, MatchKind::Hull);
        }
        assert!(service.query(LatLng::new(10.12, 0.0)).is_neutral());
    }

    #[test]
    fn view_range_limits_queries() {
        let store = store(vec![TerritoryClaim::circle(
            1,
            "red",
            LatLng::new(37.50, 127.00),
            5.0,
        )]);
        let config = QueryConfig {
            view_range: Some(ViewRange {
                origin: LatLng::new(10.0, 10.0),
                radius_km: 50.0,
            }),
            ..Default::default()
        };
        let result = PointQueryService::new(&store, &[], config).query(LatLng::new(37.50, 127.00));
        assert!(result.out_of_view);
        assert!(result.is_neutral());
    }

    #[test]
    fn nan_query_point_matches_nothing() {
        let store = store(vec![TerritoryClaim::circle(
            1,
            "red",
            LatLng::new(37.50, 127.00),
            5.0,
        )]);
        let service = PointQueryService::new(&store, &[], QueryConfig::default());
        assert!(service.query(LatLng::new(f64::NAN, 127.0)).is_neutral());
    }
}
