use geo::Orient;
use geo::orient::Direction;
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

use crate::claims::{ClaimId, OwnerId};
use crate::hull::HullKind;
use crate::projection::{LatLng, split_at_antimeridian};

/// Closed ring of `[lat, lng]` pairs, first point repeated last.
pub type Ring = Vec<[f64; 2]>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionPolygon {
    /// Counter-clockwise in (lng, lat).
    pub exterior: Ring,
    /// Clockwise in (lng, lat).
    pub holes: Vec<Ring>,
}

impl RegionPolygon {
    fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            ring_to_line_string(&self.exterior),
            self.holes.iter().map(ring_to_line_string).collect(),
        )
    }
}

/// Exclusive area of one claim after partitioning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionedRegion {
    pub claim_id: ClaimId,
    pub owner_id: OwnerId,
    /// Disjoint pieces; empty when neighbours took everything.
    pub polygons: Vec<RegionPolygon>,
}

impl PartitionedRegion {
    pub fn from_geographic(
        claim_id: ClaimId,
        owner_id: OwnerId,
        shape: &MultiPolygon<f64>,
    ) -> Self {
        Self {
            claim_id,
            owner_id,
            polygons: shape.0.iter().map(normalize_polygon).collect(),
        }
    }

    pub fn is_subsumed(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Every ring, each exterior followed by its holes.
    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.polygons
            .iter()
            .flat_map(|p| std::iter::once(&p.exterior).chain(p.holes.iter()))
    }

    /// geo-types view in (lng, lat) order.
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        MultiPolygon::new(self.polygons.iter().map(RegionPolygon::to_polygon).collect())
    }

    pub fn to_feature(&self) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert("claimId".to_string(), json!(self.claim_id));
        properties.insert("ownerId".to_string(), json!(self.owner_id));
        properties.insert("subsumed".to_string(), json!(self.is_subsumed()));
        feature(Value::from(&self.to_multi_polygon()), properties)
    }
}

/// Connected territory built from one owner's beacons.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconHull {
    pub owner_id: OwnerId,
    /// Contiguous ring; longitudes may run past ±180 for hulls across the antimeridian.
    pub ring: Ring,
    pub source_beacon_ids: Vec<ClaimId>,
    pub kind: HullKind,
}

impl BeaconHull {
    pub fn from_geographic(
        owner_id: OwnerId,
        polygon: &Polygon<f64>,
        source_beacon_ids: Vec<ClaimId>,
        kind: HullKind,
    ) -> Self {
        Self {
            owner_id,
            ring: normalize_polygon(polygon).exterior,
            source_beacon_ids,
            kind,
        }
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(ring_to_line_string(&self.ring), vec![])
    }

    /// The hull with longitudes folded into range, split at the antimeridian if needed.
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        split_at_antimeridian(MultiPolygon::new(vec![self.to_polygon()]))
    }

    pub fn to_feature(&self) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert("ownerId".to_string(), json!(self.owner_id));
        properties.insert("sourceBeaconIds".to_string(), json!(self.source_beacon_ids));
        properties.insert("kind".to_string(), json!(self.kind));
        feature(Value::from(&self.to_multi_polygon()), properties)
    }
}

/// Orient exterior CCW and holes CW, and emit closed `[lat, lng]` rings.
pub fn normalize_polygon(polygon: &Polygon<f64>) -> RegionPolygon {
    let oriented = polygon.orient(Direction::Default);
    RegionPolygon {
        exterior: line_string_to_ring(oriented.exterior()),
        holes: oriented.interiors().iter().map(line_string_to_ring).collect(),
    }
}

fn line_string_to_ring(line: &LineString<f64>) -> Ring {
    let mut ring: Ring = line
        .coords()
        .map(|c| LatLng::from_coord(*c).to_pair())
        .collect();
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    ring
}

fn ring_to_line_string(ring: &Ring) -> LineString<f64> {
    ring.iter()
        .map(|[lat, lng]| Coord { x: *lng, y: *lat })
        .collect()
}

fn feature(value: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

pub fn regions_to_feature_collection(regions: &[PartitionedRegion]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: regions.iter().map(PartitionedRegion::to_feature).collect(),
        foreign_members: None,
    }
}

pub fn hulls_to_feature_collection(hulls: &[BeaconHull]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: hulls.iter().map(BeaconHull::to_feature).collect(),
        foreign_members: None,
    }
}
