use ahash::AHashMap as HashMap;
use ahash::AHashSet as HashSet;
use geo::orient::Direction;
use geo::{Area, Distance, Haversine, Intersects, Orient};
use geo_types::{LineString, Polygon};
use std::fmt;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{ClaimRejection, EngineError};
use crate::projection::LatLng;

pub type ClaimId = i64;

/// Owning player or faction. Backends send either numbers or strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OwnerId {
    Numeric(i64),
    Named(String),
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerId::Numeric(id) => write!(f, "{id}"),
            OwnerId::Named(name) => f.write_str(name),
        }
    }
}

impl From<i64> for OwnerId {
    fn from(id: i64) -> Self {
        OwnerId::Numeric(id)
    }
}

impl From<&str> for OwnerId {
    fn from(name: &str) -> Self {
        OwnerId::Named(name.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactionKind {
    #[default]
    Player,
    /// City-state style territory that always wins boundary disputes.
    #[serde(alias = "absolute")]
    AbsoluteNpc,
    #[serde(alias = "free")]
    FreeNpc,
}

impl FactionKind {
    /// Whether the claim's edge is settled by the power diagram rather than imposed.
    pub fn is_negotiable(self) -> bool {
        !matches!(self, FactionKind::AbsoluteNpc)
    }
}

/// Radius as it arrives on the wire; some backends stringify numbers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RadiusValue {
    Number(f64),
    Text(String),
}

/// A claim record as supplied by the backend, before validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerritoryClaim {
    pub id: ClaimId,
    pub owner_id: OwnerId,
    pub center: LatLng,
    #[serde(default)]
    pub radius: Option<RadiusValue>,
    #[serde(default)]
    pub custom_boundary: Option<Vec<LatLng>>,
    #[serde(default)]
    pub is_beacon: bool,
    #[serde(default)]
    pub faction_kind: FactionKind,
    #[serde(default)]
    pub color: Option<String>,
}

impl TerritoryClaim {
    pub fn circle(
        id: ClaimId,
        owner_id: impl Into<OwnerId>,
        center: LatLng,
        radius_km: f64,
    ) -> Self {
        Self {
            id,
            owner_id: owner_id.into(),
            center,
            radius: Some(RadiusValue::Number(radius_km)),
            custom_boundary: None,
            is_beacon: false,
            faction_kind: FactionKind::Player,
            color: None,
        }
    }

    pub fn polygon(
        id: ClaimId,
        owner_id: impl Into<OwnerId>,
        center: LatLng,
        boundary: Vec<LatLng>,
    ) -> Self {
        Self {
            custom_boundary: Some(boundary),
            faction_kind: FactionKind::AbsoluteNpc,
            ..Self::circle(id, owner_id, center, 0.0)
        }
    }

    pub fn beacon(mut self) -> Self {
        self.is_beacon = true;
        self
    }

    pub fn with_faction(mut self, faction_kind: FactionKind) -> Self {
        self.faction_kind = faction_kind;
        self
    }

    fn resolve_radius(&self, default_radius_km: f64) -> Result<f64, ClaimRejection> {
        let parsed = match &self.radius {
            None => None,
            Some(RadiusValue::Number(r)) => Some(*r),
            Some(RadiusValue::Text(text)) => Some(
                text.trim()
                    .parse::<f64>()
                    .map_err(|_| ClaimRejection::NonNumericRadius(text.clone()))?,
            ),
        };
        Ok(match parsed {
            Some(r) if r.is_finite() && r >= 0.0 => r,
            _ => default_radius_km,
        })
    }

    /// Check the record and turn it into a [`Claim`] the geometry can trust.
    pub fn validate(&self, default_radius_km: f64) -> Result<Claim, ClaimRejection> {
        let c = self.center;
        if !c.is_finite() {
            return Err(ClaimRejection::NonFiniteCenter {
                lat: c.lat,
                lng: c.lng,
            });
        }
        if !c.in_range() {
            return Err(ClaimRejection::CenterOutOfRange {
                lat: c.lat,
                lng: c.lng,
            });
        }
        let radius_km = self.resolve_radius(default_radius_km)?;

        let shape = match &self.custom_boundary {
            None => ClaimShape::Circular,
            Some(points) => ClaimShape::Polygonal(boundary_polygon(points)?),
        };

        Ok(Claim {
            id: self.id,
            owner_id: self.owner_id.clone(),
            center: c,
            radius_km,
            shape,
            is_beacon: self.is_beacon,
            faction: self.faction_kind,
            color: self.color.clone(),
        })
    }
}

fn boundary_polygon(points: &[LatLng]) -> Result<Polygon<f64>, ClaimRejection> {
    let mut ring = Vec::with_capacity(points.len() + 1);
    for (index, p) in points.iter().enumerate() {
        if !p.is_finite() || !p.in_range() {
            return Err(ClaimRejection::InvalidBoundaryPoint { index });
        }
        if ring.last() != Some(&p.to_coord()) {
            ring.push(p.to_coord());
        }
    }
    // callers may or may not close the ring themselves
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 {
        return Err(ClaimRejection::BoundaryTooSmall(ring.len()));
    }

    let polygon = Polygon::new(LineString::new(ring), vec![]);
    if polygon.unsigned_area() <= f64::EPSILON {
        return Err(ClaimRejection::DegenerateBoundary);
    }
    Ok(polygon.orient(Direction::Default))
}

/// The primitive a claim's territory is built from.
#[derive(Clone, Debug, PartialEq)]
pub enum ClaimShape {
    /// A circle of `radius_km` around the centre.
    Circular,
    /// A fixed boundary, stored in (lng, lat) order. Acts as a wall for neighbours.
    Polygonal(Polygon<f64>),
}

/// A validated claim. Immutable for the duration of a pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Claim {
    pub id: ClaimId,
    pub owner_id: OwnerId,
    pub center: LatLng,
    pub radius_km: f64,
    pub shape: ClaimShape,
    pub is_beacon: bool,
    pub faction: FactionKind,
    pub color: Option<String>,
}

impl Claim {
    pub fn is_wall(&self) -> bool {
        matches!(self.shape, ClaimShape::Polygonal(_))
    }

    pub fn boundary(&self) -> Option<&Polygon<f64>> {
        match &self.shape {
            ClaimShape::Polygonal(polygon) => Some(polygon),
            ClaimShape::Circular => None,
        }
    }

    /// Great-circle distance from the centre, in kilometres.
    pub fn distance_km(&self, point: LatLng) -> f64 {
        Haversine.distance(self.center.to_point(), point.to_point()) / 1000.0
    }

    /// Direct radius test, ignoring any custom boundary.
    pub fn circle_contains(&self, point: LatLng) -> bool {
        self.distance_km(point) <= self.radius_km
    }

    /// Containment against the claim's own primitive, boundary inclusive.
    pub fn contains(&self, point: LatLng) -> bool {
        match &self.shape {
            ClaimShape::Circular => self.circle_contains(point),
            ClaimShape::Polygonal(polygon) => polygon.intersects(&point.to_point()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RejectedClaim {
    /// `None` when the record was too malformed to carry an id.
    pub id: Option<ClaimId>,
    pub reason: ClaimRejection,
}

/// Snapshot of the valid claims for one computation.
#[derive(Clone, Debug, Default)]
pub struct ClaimStore {
    claims: Vec<Claim>,
    rejected: Vec<RejectedClaim>,
}

impl ClaimStore {
    pub fn from_records<I>(records: I, config: &EngineConfig) -> Self
    where
        I: IntoIterator<Item = TerritoryClaim>,
    {
        let mut store = ClaimStore::default();
        let mut seen = HashSet::new();

        for record in records {
            if seen.contains(&record.id) {
                store.reject(Some(record.id), ClaimRejection::DuplicateId(record.id));
                continue;
            }
            // only an accepted record reserves its id
            match record.validate(config.default_radius_km) {
                Ok(claim) => {
                    seen.insert(claim.id);
                    store.claims.push(claim);
                }
                Err(reason) => store.reject(Some(record.id), reason),
            }
        }

        debug!(
            accepted = store.claims.len(),
            rejected = store.rejected.len(),
            "loaded claim store"
        );
        store
    }

    /// Decode a JSON array of claim records. A record that fails to decode is rejected on
    /// its own; only a payload that is not an array at all is an error.
    pub fn from_json(json: &str, config: &EngineConfig) -> Result<Self, EngineError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Array(items) = value else {
            return Err(EngineError::NotAnArray);
        };

        let mut malformed = Vec::new();
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let id = item.get("id").and_then(serde_json::Value::as_i64);
            match serde_json::from_value::<TerritoryClaim>(item) {
                Ok(record) => records.push(record),
                Err(e) => malformed.push(RejectedClaim {
                    id,
                    reason: ClaimRejection::Malformed(e.to_string()),
                }),
            }
        }

        let mut store = Self::from_records(records, config);
        for rejected in malformed {
            store.reject(rejected.id, rejected.reason);
        }
        Ok(store)
    }

    fn reject(&mut self, id: Option<ClaimId>, reason: ClaimRejection) {
        warn!(claim_id = ?id, %reason, "excluding claim");
        self.rejected.push(RejectedClaim { id, reason });
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn rejected(&self) -> &[RejectedClaim] {
        &self.rejected
    }

    pub fn get(&self, id: ClaimId) -> Option<&Claim> {
        self.claims.iter().find(|claim| claim.id == id)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Beacon claims grouped per owner, owners in order of first appearance.
    pub fn beacons_by_owner(&self) -> Vec<(&OwnerId, Vec<&Claim>)> {
        let mut slots: HashMap<&OwnerId, usize> = HashMap::new();
        let mut groups: Vec<(&OwnerId, Vec<&Claim>)> = Vec::new();
        for claim in self.claims.iter().filter(|c| c.is_beacon) {
            let slot = *slots.entry(&claim.owner_id).or_insert_with(|| {
                groups.push((&claim.owner_id, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(claim);
        }
        groups
    }
}
