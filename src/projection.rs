use geo::{BooleanOps, BoundingRect, MapCoords};
use geo_types::{Coord, MultiPolygon, Point, Polygon, Rect};

/// Mean earth radius, matching the radius `geo`'s Haversine distance uses.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;
pub const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    /// geo-types point in (lng, lat) order.
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lng, self.lat)
    }

    pub fn to_coord(self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }

    pub fn from_coord(c: Coord<f64>) -> Self {
        Self { lat: c.y, lng: c.x }
    }

    /// `[lat, lng]`, the pair layout handed to the renderer.
    pub fn to_pair(self) -> [f64; 2] {
        [self.lat, self.lng]
    }
}

/// A local equirectangular plane in kilometres around a reference point.
///
/// x = R * cos(ref_lat) * dlng, y = R * dlat
///
/// Scale distortion only has to be self-consistent within one computation, so every
/// partition or hull pass picks one reference and sticks to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoProjection {
    ref_lat: f64,
    ref_lng: f64,
    cos_ref_lat: f64,
}

impl GeoProjection {
    pub fn new(reference: LatLng) -> Self {
        Self {
            ref_lat: reference.lat,
            ref_lng: reference.lng,
            cos_ref_lat: reference.lat.to_radians().cos(),
        }
    }

    /// Reference at the mean of the given points, `None` when there are none.
    ///
    /// Longitudes are averaged as offsets from the first point, so a cluster straddling
    /// the antimeridian is centred on it rather than on the prime meridian.
    pub fn centered_on<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (count, lat_sum, dlng_sum) =
            points.fold((1usize, first.lat, 0.0), |(n, lat, dlng), p| {
                (n + 1, lat + p.lat, dlng + wrap_degrees(p.lng - first.lng))
            });
        Some(Self::new(LatLng::new(
            lat_sum / count as f64,
            wrap_degrees(first.lng + dlng_sum / count as f64),
        )))
    }

    pub fn reference(&self) -> LatLng {
        LatLng::new(self.ref_lat, self.ref_lng)
    }

    pub fn project(&self, p: LatLng) -> Coord<f64> {
        // shortest way round, so claims straddling the antimeridian stay contiguous
        let dlng = wrap_degrees(p.lng - self.ref_lng);
        Coord {
            x: dlng * self.cos_ref_lat * KM_PER_DEGREE,
            y: (p.lat - self.ref_lat) * KM_PER_DEGREE,
        }
    }

    pub fn unproject(&self, c: Coord<f64>) -> LatLng {
        LatLng::new(
            self.ref_lat + c.y / KM_PER_DEGREE,
            self.ref_lng + c.x / (self.cos_ref_lat * KM_PER_DEGREE),
        )
    }

    /// Project a geo-types coordinate stored in (lng, lat) order.
    pub fn project_coord(&self, c: Coord<f64>) -> Coord<f64> {
        self.project(LatLng::from_coord(c))
    }

    pub fn unproject_coord(&self, c: Coord<f64>) -> Coord<f64> {
        self.unproject(c).to_coord()
    }

    pub fn project_polygon(&self, polygon: &Polygon<f64>) -> Polygon<f64> {
        let projection = *self;
        polygon.map_coords(move |c| projection.project_coord(c))
    }

    pub fn unproject_multi_polygon(&self, polygons: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        let projection = *self;
        polygons.map_coords(move |c| projection.unproject_coord(c))
    }
}

/// Longitude or longitude difference folded into `[-180, 180)`.
pub fn wrap_degrees(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

/// Cut (lng, lat) geometry that runs past ±180° and shift the overhang back into range.
///
/// Unprojected shapes near the antimeridian come out contiguous, with longitudes beyond
/// 180; renderers and point tests expect normalized longitudes instead.
pub fn split_at_antimeridian(polygons: MultiPolygon<f64>) -> MultiPolygon<f64> {
    let Some(bounds) = polygons.bounding_rect() else {
        return polygons;
    };
    if bounds.min().x >= -180.0 && bounds.max().x <= 180.0 {
        return polygons;
    }

    let mut pieces = Vec::new();
    for offset in [-360.0, 0.0, 360.0] {
        let window = Rect::new(
            Coord {
                x: offset - 180.0,
                y: bounds.min().y - 1.0,
            },
            Coord {
                x: offset + 180.0,
                y: bounds.max().y + 1.0,
            },
        );
        let inside = polygons.intersection(&MultiPolygon::new(vec![window.to_polygon()]));
        pieces.extend(inside.0.into_iter().map(|piece| {
            piece.map_coords(|c| Coord {
                x: c.x - offset,
                y: c.y,
            })
        }));
    }
    MultiPolygon::new(pieces)
}

/// Euclidean distance in the projected plane.
pub fn planar_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}
