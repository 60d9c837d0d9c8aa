//! Danger levels, their colors, and the slope table used by steepness logic.

use crate::error::Error;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An ordinal hazard rank, 1 (low) to 5 (very high).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerLevel {
    Low = 1,
    Moderate = 2,
    Considerable = 3,
    High = 4,
    VeryHigh = 5,
}

impl DangerLevel {
    /// Parses a bulletin rating name such as `considerable` or `very_high`.
    pub fn from_name(name: &str) -> Option<DangerLevel> {
        match name {
            "low" => Some(DangerLevel::Low),
            "moderate" => Some(DangerLevel::Moderate),
            "considerable" => Some(DangerLevel::Considerable),
            "high" => Some(DangerLevel::High),
            "very_high" => Some(DangerLevel::VeryHigh),
            _ => None,
        }
    }

    pub fn value(self) -> u8 {
        self as u8
    }
}

/// An opaque 8-bit color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Rgb {
        Rgb { r, g, b }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl FromStr for Rgb {
    type Err = Error;

    /// Accepts `#RRGGBB` or `RRGGBB`, in either case.
    fn from_str(s: &str) -> Result<Rgb, Error> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidColor(s.to_owned()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| Error::InvalidColor(s.to_owned()))
        };

        Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = Error;

    fn try_from(s: String) -> Result<Rgb, Error> {
        s.parse()
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> String {
        c.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Colors painted for each danger level.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DangerPalette {
    pub low: Rgb,
    pub moderate: Rgb,
    pub considerable: Rgb,
    pub high: Rgb,
    pub very_high: Rgb,
}

impl Default for DangerPalette {
    fn default() -> Self {
        DangerPalette {
            low: Rgb::new(0xCC, 0xFF, 0x66),
            moderate: Rgb::new(0xFF, 0xFF, 0x33),
            considerable: Rgb::new(0xFF, 0x99, 0x00),
            high: Rgb::new(0xFF, 0x00, 0x00),
            very_high: Rgb::new(0xA6, 0x00, 0x00),
        }
    }
}

impl DangerPalette {
    pub fn color(&self, level: DangerLevel) -> Rgb {
        match level {
            DangerLevel::Low => self.low,
            DangerLevel::Moderate => self.moderate,
            DangerLevel::Considerable => self.considerable,
            DangerLevel::High => self.high,
            DangerLevel::VeryHigh => self.very_high,
        }
    }
}

/// Rating shown for a cell of numeric danger `level` on terrain of `slope` degrees,
/// or `None` when the cell is not shown at all.
///
/// Only steeper terrain keeps a rating at lower levels; the displayed rating never
/// exceeds `High`.
pub fn steepness_rating(level: u8, slope: f64) -> Option<DangerLevel> {
    match level {
        0 => None,
        1 if slope >= 40.0 => Some(DangerLevel::Considerable),
        1 => None,
        2 if slope >= 40.0 => Some(DangerLevel::High),
        2 if slope >= 35.0 => Some(DangerLevel::Considerable),
        2 => None,
        3 if slope >= 35.0 => Some(DangerLevel::High),
        3 if slope >= 30.0 => Some(DangerLevel::Considerable),
        3 => None,
        _ if slope >= 30.0 => Some(DangerLevel::High),
        _ => Some(DangerLevel::Considerable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!(Rgb::new(0xFF, 0x99, 0x00), "#FF9900".parse::<Rgb>().unwrap());
        assert_eq!(Rgb::new(0xA6, 0x00, 0x00), "a60000".parse::<Rgb>().unwrap());
        assert_eq!("#CCFF66", Rgb::new(0xCC, 0xFF, 0x66).to_string());

        for bad in &["", "#FFF", "#GG0000", "#FF99000", "orange", "#ÿÿÿ"] {
            assert!(bad.parse::<Rgb>().is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_danger_level_names() {
        assert_eq!(Some(DangerLevel::VeryHigh), DangerLevel::from_name("very_high"));
        assert_eq!(3, DangerLevel::Considerable.value());
        assert_eq!(None, DangerLevel::from_name("extreme"));
    }

    #[test]
    fn test_steepness_table() {
        use DangerLevel::{Considerable, High};

        // (level, slope, expected)
        let cases: &[(u8, f64, Option<DangerLevel>)] = &[
            (5, 10.0, Some(Considerable)),
            (5, 45.0, Some(High)),
            (4, 0.0, Some(Considerable)),
            (4, 29.9, Some(Considerable)),
            (4, 30.0, Some(High)),
            (4, 45.0, Some(High)),
            (3, 29.9, None),
            (3, 30.0, Some(Considerable)),
            (3, 34.9, Some(Considerable)),
            (3, 35.0, Some(High)),
            (3, 45.0, Some(High)),
            (2, 29.9, None),
            (2, 34.9, None),
            (2, 35.0, Some(Considerable)),
            (2, 39.9, Some(Considerable)),
            (2, 40.0, Some(High)),
            (2, 45.0, Some(High)),
            (1, 35.0, None),
            (1, 39.9, None),
            (1, 40.0, Some(Considerable)),
            (1, 45.0, Some(Considerable)),
            (0, 45.0, None),
            (0, 10.0, None),
        ];

        for &(level, slope, expected) in cases {
            assert_eq!(
                expected,
                steepness_rating(level, slope),
                "level {} slope {}",
                level,
                slope
            );
        }
    }
}
