//! Request types: coordinates, travel modes and trips.

use crate::{Error, Result};
use core::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};
use serde::{Serialize, Serializer};

/// A latitude/longitude pair in decimal degrees.
///
/// Formatted with eight decimal places (`"40.71117416,-74.00016545"`), which
/// is the precision the Directions API receives.
///
/// Equality and hashing compare the bit patterns of both floats so a `Coord`
/// can key a map. Two coordinates that print the same but differ in their
/// low bits are distinct keys.
#[derive(Debug, Clone, Copy)]
pub struct Coord {
    pub lat: f64,
    pub lng: f64,
}

impl Coord {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    const fn bits(&self) -> (u64, u64) {
        (self.lat.to_bits(), self.lng.to_bits())
    }
}

impl PartialEq for Coord {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Coord {}

impl Hash for Coord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.8},{:.8}", self.lat, self.lng)
    }
}

impl FromStr for Coord {
    type Err = Error;

    /// Parses `"LAT,LNG"`. Surrounding whitespace around either number is
    /// ignored.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::Parse {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| invalid("expected `LAT,LNG`"))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|_| invalid("latitude is not a number"))?;
        let lng: f64 = lng
            .trim()
            .parse()
            .map_err(|_| invalid("longitude is not a number"))?;

        if !(-90.0..=90.0).contains(&lat) {
            return Err(invalid("latitude must be within [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(invalid("longitude must be within [-180, 180]"));
        }

        Ok(Self { lat, lng })
    }
}

impl Serialize for Coord {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Travel mode understood by the Directions API.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Walking,
    Bicycling,
    Transit,
    #[default]
    Driving,
}

impl Mode {
    /// The value sent as the `mode` query parameter.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Walking => "walking",
            Self::Bicycling => "bicycling",
            Self::Transit => "transit",
            Self::Driving => "driving",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walking" => Ok(Self::Walking),
            "bicycling" => Ok(Self::Bicycling),
            "transit" => Ok(Self::Transit),
            "driving" => Ok(Self::Driving),
            _ => Err(Error::Parse {
                input: s.to_string(),
                reason: "expected one of walking, bicycling, transit, driving".to_string(),
            }),
        }
    }
}

/// One distance lookup: where from, where to and how.
///
/// Used both as the job payload and as the key of batch results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Trip {
    pub origin: Coord,
    pub destination: Coord,
    pub mode: Mode,
}

impl Trip {
    pub const fn new(origin: Coord, destination: Coord, mode: Mode) -> Self {
        Self {
            origin,
            destination,
            mode,
        }
    }

    /// Parses `"LAT,LNG:LAT,LNG"` into a trip travelled with `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if either coordinate is malformed or the
    /// separator is missing.
    pub fn parse_with_mode(s: &str, mode: Mode) -> Result<Self> {
        let (origin, destination) = s.trim().split_once(':').ok_or_else(|| Error::Parse {
            input: s.to_string(),
            reason: "expected `LAT,LNG:LAT,LNG`".to_string(),
        })?;

        Ok(Self {
            origin: origin.parse()?,
            destination: destination.parse()?,
            mode,
        })
    }
}

impl fmt::Display for Trip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.origin, self.destination, self.mode)
    }
}
