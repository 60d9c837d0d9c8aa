//! Overlay configuration YAML format.
//!
//! Every field is optional; anything left out takes the default shown on the
//! corresponding `Default` impl.

use crate::danger::DangerPalette;
use crate::error::Error;
use crate::tile::MAX_TILE_ZOOM;

use serde::Deserialize;

pub const DEFAULT_TERRAIN_BASE_URL: &str = "https://api.maptiler.com/tiles/terrain-rgb-v2";

#[derive(Clone, Deserialize, Debug, Default)]
#[serde(default)]
pub struct OverlayConfig {
    pub sampler: SamplerConfig,
    pub raster: RasterConfig,
}

impl OverlayConfig {
    /// Constructs a new OverlayConfig from a YAML string
    pub fn from_yaml(data: &str) -> Result<OverlayConfig, Error> {
        let config: OverlayConfig = serde_yaml::from_str(data)?;
        config.sampler.validate()?;
        Ok(config)
    }
}

/// Where elevation tiles come from and which zoom they are sampled at.
#[derive(Clone, Deserialize, Debug)]
#[serde(default)]
pub struct SamplerConfig {
    pub base_url: String,
    pub api_key: String,
    /// Edge length of a tile in pixels.
    pub tile_size: u32,
    /// Added to the floored map zoom to pick the tile zoom.
    pub zoom_offset: u8,
    /// Highest tile zoom ever requested.
    pub max_tile_zoom: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            base_url: String::from(DEFAULT_TERRAIN_BASE_URL),
            api_key: String::new(),
            tile_size: 512,
            zoom_offset: 2,
            max_tile_zoom: 12,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.tile_size == 0 {
            return Err(Error::InvalidConfig(String::from("tile_size must be positive")));
        }

        if self.max_tile_zoom > MAX_TILE_ZOOM {
            return Err(Error::InvalidConfig(format!(
                "max_tile_zoom {} is above {}",
                self.max_tile_zoom, MAX_TILE_ZOOM
            )));
        }

        Ok(())
    }
}

/// What happens to a cell whose aspect is not one of the rule's valid aspects.
#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectPolicy {
    /// Lower the rule's danger level by one step (level 0 cells are dropped).
    #[default]
    Downgrade,
    /// Drop the cell.
    Exclude,
}

#[derive(Clone, Deserialize, Debug)]
#[serde(default)]
pub struct RasterConfig {
    /// Number of grid cells along the longer side of the viewport.
    pub grid_density: u32,
    /// Angular distance in degrees to the neighbors used for slope and aspect.
    pub terrain_offset: f64,
    pub aspect_policy: AspectPolicy,
    /// Cells at or above this slope are dropped by rules with steepness logic.
    pub steepness_cutoff: Option<f64>,
    pub palette: DangerPalette,
}

impl Default for RasterConfig {
    fn default() -> Self {
        RasterConfig {
            grid_density: 200,
            terrain_offset: 1e-4,
            aspect_policy: AspectPolicy::default(),
            steepness_cutoff: None,
            palette: DangerPalette::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::danger::Rgb;

    #[test]
    fn test_parse_overlay_config() {
        let data =
            fs::read_to_string("test_data/overlay.yml").expect("Unable to read the test yml file.");

        match OverlayConfig::from_yaml(&data) {
            Ok(config) => {
                assert_eq!("test-key", config.sampler.api_key);
                assert_eq!(512, config.sampler.tile_size);
                assert_eq!(11, config.sampler.max_tile_zoom);

                assert_eq!(150, config.raster.grid_density);
                assert_eq!(AspectPolicy::Exclude, config.raster.aspect_policy);
                assert_eq!(Some(50.0), config.raster.steepness_cutoff);
                assert_eq!(Rgb::new(0xff, 0x99, 0x00), config.raster.palette.considerable);
                assert_eq!(Rgb::new(0x80, 0x00, 0x00), config.raster.palette.high);
            }
            Err(e) => panic!("{}", e),
        }
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = OverlayConfig::from_yaml("{}").unwrap();

        assert_eq!(DEFAULT_TERRAIN_BASE_URL, config.sampler.base_url);
        assert_eq!(2, config.sampler.zoom_offset);
        assert_eq!(12, config.sampler.max_tile_zoom);
        assert_eq!(AspectPolicy::Downgrade, config.raster.aspect_policy);
        assert_eq!(None, config.raster.steepness_cutoff);
    }

    #[test]
    fn test_reject_unusable_sampler_settings() {
        for yaml in &["sampler:\n  tile_size: 0\n", "sampler:\n  max_tile_zoom: 40\n"] {
            match OverlayConfig::from_yaml(yaml) {
                Err(Error::InvalidConfig(_)) => {}
                other => panic!("Expected InvalidConfig for {:?}, got {:?}", yaml, other),
            }
        }

        assert!(OverlayConfig::from_yaml("sampler:\n  max_tile_zoom: 24\n").is_ok());
    }

    #[test]
    fn test_reject_unknown_aspect_policy() {
        assert!(OverlayConfig::from_yaml("raster:\n  aspect_policy: sometimes\n").is_err());
    }
}
