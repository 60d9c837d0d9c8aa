//! # Terrain Overlay
//!
//! Tools for painting terrain hazard rules onto a raster using Terrain-RGB elevation tiles.
//!
//! ## Current features
//!
//! Given an ordered list of [`rule::GenerationRule`]s (elevation bands, slope thresholds,
//! aspect filters and danger levels, optionally clipped to region polygons) and a map
//! viewport, this crate fetches the elevation tiles covering the viewport, derives slope
//! and aspect from them, and composites the rules into a single RGBA raster together with
//! the geographic corners it should be projected onto.
//!
//! The pieces are usable on their own:
//!
//! * [`sampler::TileSampler`] caches decoded tiles and answers bilinear elevation queries.
//! * [`terrain::calculate_terrain_metrics`] turns any elevation query into slope and aspect.
//! * [`geometry`] has the polygon containment tests used to clip rules to regions.
//! * [`rasterizer::RuleRasterizer`] ties everything together.
//!
//! ## Known Limitations
//!
//! Tiles are sampled at a single working zoom derived from the map zoom; there is no
//! blending across zoom levels. Fetched tiles (and failed fetches) are kept until the
//! cache is cleared explicitly, so a tile that failed once is not retried. Viewports
//! crossing the antimeridian are not supported.
//!
//! The trait-based design allows other elevation sources (local tile stores, synthetic
//! fields) to be plugged in through [`TileSource`] or [`ElevationModel`].

#![deny(warnings)]

use async_trait::async_trait;

use crate::error::Error;
use crate::geometry::Bounds;
use crate::tile::TileKey;

/// A provider of encoded Terrain-RGB tiles.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Fetches the PNG bytes of a slippy map tile in XYZ format.
    async fn fetch_tile(&self, key: TileKey) -> Result<Vec<u8>, Error>;
}

/// A queryable elevation field.
#[async_trait]
pub trait ElevationModel: Send + Sync {
    /// Loads whatever is needed to answer queries inside `bounds` at the given map zoom,
    /// returning the level of detail those queries should be made at. Completes only once
    /// every load it depends on has settled. An error means no elevation is available for
    /// the viewport at all.
    async fn prepare(&self, bounds: &Bounds, viewport_zoom: f64) -> Result<u8, Error>;

    /// Elevation in meters at level of detail `zoom`, or `None` where there is no data.
    fn elevation(&self, zoom: u8, lng: f64, lat: f64) -> Option<f64>;
}

pub mod config;
pub mod danger;
pub mod error;
pub mod geometry;
pub mod rasterizer;
pub mod rule;
pub mod sampler;
pub mod source;
pub mod terrain;
pub mod tile;

pub use crate::config::OverlayConfig;
pub use crate::rasterizer::{RasterResult, RuleRasterizer};
pub use crate::rule::GenerationRule;
pub use crate::sampler::TileSampler;
pub use crate::source::HttpTileSource;
