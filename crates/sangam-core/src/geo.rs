//! Great-circle distance filter.

use crate::profile::Coordinates;

/// Mean earth radius (IUGG), metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Radius used by the "nearby profiles" listing.
pub const NEARBY_RADIUS_M: f64 = 30_000.0;

/// Haversine distance between two points, in metres.
pub fn distance_m(a: Coordinates, b: Coordinates) -> f64 {
  let (phi1, phi2) = (a.lat.to_radians(), b.lat.to_radians());
  let d_phi = (b.lat - a.lat).to_radians();
  let d_lambda = (b.lon - a.lon).to_radians();

  let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
  2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Distance from `origin` to `candidate` if the candidate has a position and
/// lies within `radius_m`. Candidates without a position are never inside.
pub fn within(origin: Coordinates, candidate: Option<Coordinates>, radius_m: f64) -> Option<f64> {
  let d = distance_m(origin, candidate?);
  (d <= radius_m).then_some(d)
}
