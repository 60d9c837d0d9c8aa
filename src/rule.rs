//! Generation rule format.
//!
//! Rules arrive as JSON or YAML documents in the camelCase layout produced by the
//! bulletin processing service. Order matters: when rules overlap, later ones win.

use crate::danger::{DangerLevel, Rgb};
use crate::error::Error;
use crate::geometry::{Bounds, Geometry};
use crate::terrain::Aspect;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRule {
    pub bounds: Bounds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    pub min_elev: f64,
    pub max_elev: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_slope: Option<f64>,
    #[serde(default)]
    pub apply_steepness_logic: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_aspects: Vec<Aspect>,
    /// `#RRGGBB`. Kept as text so one bad color only disables its own rule.
    pub color: String,
    /// Passed through untouched apart from `dangerLevel`.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl GenerationRule {
    pub fn new(bounds: Bounds, min_elev: f64, max_elev: f64, color: &str) -> GenerationRule {
        GenerationRule {
            bounds,
            geometry: None,
            min_elev,
            max_elev,
            min_slope: None,
            apply_steepness_logic: false,
            valid_aspects: Vec::new(),
            color: color.to_owned(),
            properties: Map::new(),
        }
    }

    /// Restricts the rule to `geometry`, narrowing its bounds to the geometry's extent.
    pub fn with_geometry(mut self, geometry: Geometry) -> GenerationRule {
        if let Some(bounds) = geometry.bounds() {
            self.bounds = bounds;
        }
        self.geometry = Some(geometry);
        self
    }

    pub fn with_danger_level(mut self, level: DangerLevel) -> GenerationRule {
        let name = serde_json::to_value(level).unwrap_or(Value::Null);
        self.properties.insert(String::from("dangerLevel"), name);
        self
    }

    /// Parses a list of rules from a YAML or JSON document.
    pub fn load_all(data: &str) -> Result<Vec<GenerationRule>, Error> {
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn rgb(&self) -> Result<Rgb, Error> {
        self.color.parse()
    }

    pub fn danger_level(&self) -> Option<DangerLevel> {
        self.properties
            .get("dangerLevel")
            .and_then(Value::as_str)
            .and_then(DangerLevel::from_name)
    }

    /// Numeric danger level, 0 when the rule carries none.
    pub fn severity(&self) -> u8 {
        self.danger_level().map_or(0, DangerLevel::value)
    }

    pub fn filters_aspect(&self) -> bool {
        !self.valid_aspects.is_empty()
    }

    pub fn filters_slope(&self) -> bool {
        self.min_slope.map_or(false, |s| s > 0.0) || self.apply_steepness_logic
    }

    /// Whether evaluating this rule needs slope and aspect at each cell.
    pub fn needs_terrain(&self) -> bool {
        self.filters_aspect() || self.filters_slope()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_parse_rules() {
        let data =
            fs::read_to_string("test_data/rules.yml").expect("Unable to read the test yml file.");

        let rules = GenerationRule::load_all(&data).expect("Unable to parse rules");
        assert_eq!(3, rules.len());

        let first = &rules[0];
        assert_eq!(None, first.geometry);
        assert!(!first.needs_terrain());
        assert_eq!(0, first.severity());
        assert_eq!(Rgb::new(0x00, 0x00, 0xFF), first.rgb().unwrap());

        let second = &rules[1];
        assert!(matches!(second.geometry, Some(Geometry::Polygon(_))));
        assert_eq!(vec![Aspect::N, Aspect::NE, Aspect::NW], second.valid_aspects);
        assert_eq!(Some(DangerLevel::Considerable), second.danger_level());
        assert!(second.apply_steepness_logic);
        assert!(second.needs_terrain());
        assert_eq!(
            Some("AT-07-14"),
            second.properties.get("regionId").and_then(Value::as_str)
        );

        let third = &rules[2];
        assert!(matches!(third.geometry, Some(Geometry::MultiPolygon(_))));
        assert_eq!(Some(30.0), third.min_slope);
        assert!(third.rgb().is_err());
    }

    #[test]
    fn test_json_rules() {
        let data = r##"[{
            "bounds": {"minLng": 10.0, "maxLng": 11.0, "minLat": 46.0, "maxLat": 47.0},
            "minElev": 1800, "maxElev": 9000, "validAspects": ["S", "SW"],
            "color": "#FF0000", "properties": {"dangerLevel": "high"}
        }]"##;

        let rules = GenerationRule::load_all(data).unwrap();
        assert_eq!(4, rules[0].severity());
        assert_eq!(1800.0, rules[0].min_elev);
        assert!(rules[0].filters_aspect());
        assert!(!rules[0].filters_slope());
    }

    #[test]
    fn test_reject_unknown_aspect() {
        let data = r##"[{
            "bounds": {"minLng": 0, "maxLng": 1, "minLat": 0, "maxLat": 1},
            "minElev": 0, "maxElev": 1, "validAspects": ["UP"], "color": "#000000"
        }]"##;

        assert!(GenerationRule::load_all(data).is_err());
    }

    #[test]
    fn test_geometry_narrows_bounds() {
        let square = Geometry::Polygon(vec![vec![[10.5, 46.5], [10.7, 46.5], [10.7, 46.8]]]);
        let rule = GenerationRule::new(Bounds::new(0.0, 0.0, 90.0, 90.0), 0.0, 4000.0, "#FFFFFF")
            .with_geometry(square)
            .with_danger_level(DangerLevel::Moderate);

        assert_eq!(Bounds::new(10.5, 46.5, 10.7, 46.8), rule.bounds);
        assert_eq!(2, rule.severity());
    }
}
