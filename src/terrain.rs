//! Slope and aspect from central finite differences over an elevation query.

use crate::error::Error;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Meters per degree of latitude, and of longitude at the equator.
pub const METERS_PER_DEGREE: f64 = 111_111.0;

/// The compass direction a slope faces, in 45° sectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aspect {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Aspect {
    pub const ALL: [Aspect; 8] = [
        Aspect::N,
        Aspect::NE,
        Aspect::E,
        Aspect::SE,
        Aspect::S,
        Aspect::SW,
        Aspect::W,
        Aspect::NW,
    ];

    /// Quantizes a compass bearing in degrees. Each sector is centered on its
    /// direction, so `N` covers [337.5, 360) and [0, 22.5).
    pub fn from_bearing(bearing: f64) -> Aspect {
        let bearing = bearing.rem_euclid(360.0);
        let sector = ((bearing + 22.5) / 45.0).floor() as usize % 8;
        Aspect::ALL[sector]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Aspect::N => "N",
            Aspect::NE => "NE",
            Aspect::E => "E",
            Aspect::SE => "SE",
            Aspect::S => "S",
            Aspect::SW => "SW",
            Aspect::W => "W",
            Aspect::NW => "NW",
        }
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aspect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Aspect, Error> {
        Aspect::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| Error::UnknownAspect(s.to_owned()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainSample {
    /// Degrees from horizontal.
    pub slope: f64,
    pub aspect: Aspect,
}

/// Samples `elevation` one `offset` (degrees) north, east, south and west of `point`
/// and derives the slope and downhill aspect there. Returns `None` if any of the four
/// neighbors has no elevation.
pub fn calculate_terrain_metrics<F>(point: [f64; 2], offset: f64, elevation: F) -> Option<TerrainSample>
where
    F: Fn(f64, f64) -> Option<f64>,
{
    let [lng, lat] = point;

    let z_n = elevation(lng, lat + offset)?;
    let z_e = elevation(lng + offset, lat)?;
    let z_s = elevation(lng, lat - offset)?;
    let z_w = elevation(lng - offset, lat)?;

    let dist_y = 2.0 * offset * METERS_PER_DEGREE;
    let dist_x = dist_y * lat.to_radians().cos();

    let dz_dx = (z_e - z_w) / dist_x;
    let dz_dy = (z_n - z_s) / dist_y;

    let slope = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees();

    // The gradient points uphill, aspect is the downhill direction
    let angle = (-dz_dy).atan2(-dz_dx).to_degrees();
    let bearing = (90.0 - angle).rem_euclid(360.0);

    Some(TerrainSample {
        slope,
        aspect: Aspect::from_bearing(bearing),
    })
}
