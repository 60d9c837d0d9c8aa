//! Composites an ordered list of generation rules into one RGBA raster.
//!
//! The viewport is divided into square cells of equal angular size, independent of the
//! tile zoom used for elevation. Rules are painted in order, so where two rules match
//! the same cell the later one wins. Within a rule, rows are evaluated in parallel.

use crate::config::{AspectPolicy, OverlayConfig, RasterConfig};
use crate::danger::{steepness_rating, Rgb};
use crate::error::Error;
use crate::geometry::{Bounds, Position};
use crate::rule::GenerationRule;
use crate::sampler::TileSampler;
use crate::source::HttpTileSource;
use crate::terrain::calculate_terrain_metrics;
use crate::ElevationModel;

use std::ops::Range;

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use log::{debug, error, warn};
use rayon::prelude::*;

/// A painted raster and where it sits on the map.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterResult {
    /// Row-major RGBA, `width * height * 4` bytes. Unpainted cells are fully transparent.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// `[lng, lat]` of the north-west, north-east, south-east and south-west corners.
    pub corners: [Position; 4],
}

impl RasterResult {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let index = ((y * self.width + x) * 4) as usize;
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.pixels[index..index + 4]);
        Some(rgba)
    }

    pub fn painted_cells(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|p| p[3] != 0).count()
    }

    pub fn to_png(&self) -> Result<Vec<u8>, Error> {
        let mut data = Vec::new();
        PngEncoder::new(&mut data).write_image(
            &self.pixels,
            self.width,
            self.height,
            ColorType::Rgba8,
        )?;
        Ok(data)
    }
}

/// Uniform cell grid anchored at the north-west corner of the viewport.
#[derive(Clone, Copy, Debug)]
struct Grid {
    west: f64,
    north: f64,
    spacing: f64,
    width: usize,
    height: usize,
}

impl Grid {
    fn new(viewport: &Bounds, density: u32) -> Result<Grid, Error> {
        if !viewport.has_area() || density == 0 {
            return Err(Error::InvalidViewport);
        }

        let spacing = viewport.lat_range().max(viewport.lng_range()) / density as f64;

        Ok(Grid {
            west: viewport.min_lng,
            north: viewport.max_lat,
            spacing,
            width: ((viewport.lng_range() / spacing).ceil() as usize).max(1),
            height: ((viewport.lat_range() / spacing).ceil() as usize).max(1),
        })
    }

    fn cell_center(&self, x: usize, y: usize) -> Position {
        [
            self.west + (x as f64 + 0.5) * self.spacing,
            self.north - (y as f64 + 0.5) * self.spacing,
        ]
    }

    /// Columns and rows of the cells overlapping `area`.
    fn cell_range(&self, area: &Bounds) -> (Range<usize>, Range<usize>) {
        let index = |offset: f64, limit: usize| (offset / self.spacing).max(0.0).min(limit as f64);

        let columns = index(area.min_lng - self.west, self.width).floor() as usize
            ..index(area.max_lng - self.west, self.width).ceil() as usize;
        let rows = index(self.north - area.max_lat, self.height).floor() as usize
            ..index(self.north - area.min_lat, self.height).ceil() as usize;

        (columns, rows)
    }

    /// The extent actually covered, which can reach past the viewport's east and south
    /// edges because the cell counts are rounded up.
    fn corners(&self) -> [Position; 4] {
        let east = self.west + self.width as f64 * self.spacing;
        let south = self.north - self.height as f64 * self.spacing;

        [
            [self.west, self.north],
            [east, self.north],
            [east, south],
            [self.west, south],
        ]
    }
}

pub struct RuleRasterizer<M> {
    model: M,
    config: RasterConfig,
}

impl RuleRasterizer<TileSampler<HttpTileSource>> {
    /// A rasterizer reading Terrain-RGB tiles over HTTP.
    pub fn over_http(config: OverlayConfig) -> Result<Self, Error> {
        let source = HttpTileSource::new(&config.sampler);
        let sampler = TileSampler::new(source, config.sampler)?;
        Ok(RuleRasterizer::new(sampler, config.raster))
    }
}

impl<M: ElevationModel> RuleRasterizer<M> {
    pub fn new(model: M, config: RasterConfig) -> RuleRasterizer<M> {
        RuleRasterizer { model, config }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Loads elevation for `viewport` and paints `rules` over it. Fails only when the
    /// viewport is degenerate or no elevation could be loaded for it, in which case any
    /// previously drawn raster should be kept as is.
    ///
    /// Painting runs on the rayon pool and blocks the calling task until done. Callers
    /// on a latency sensitive executor can await [`ElevationModel::prepare`] themselves
    /// and hand [`RuleRasterizer::paint`] to a blocking thread instead.
    pub async fn draw(
        &self,
        viewport: &Bounds,
        viewport_zoom: f64,
        rules: &[GenerationRule],
    ) -> Result<RasterResult, Error> {
        let grid = Grid::new(viewport, self.config.grid_density)?;

        let zoom = match self.model.prepare(viewport, viewport_zoom).await {
            Ok(zoom) => zoom,
            Err(e) => {
                error!("Failed to fetch terrain tiles: {}", e);
                return Err(e);
            }
        };

        Ok(self.paint_grid(&grid, viewport, zoom, rules))
    }

    /// Paints `rules` over `viewport` from elevation already prepared at `zoom`.
    pub fn paint(
        &self,
        viewport: &Bounds,
        zoom: u8,
        rules: &[GenerationRule],
    ) -> Result<RasterResult, Error> {
        let grid = Grid::new(viewport, self.config.grid_density)?;
        Ok(self.paint_grid(&grid, viewport, zoom, rules))
    }

    fn paint_grid(
        &self,
        grid: &Grid,
        viewport: &Bounds,
        zoom: u8,
        rules: &[GenerationRule],
    ) -> RasterResult {
        let mut pixels = vec![0u8; grid.width * grid.height * 4];

        debug!(
            "Painting {} rules on a {}x{} grid at zoom {}",
            rules.len(),
            grid.width,
            grid.height,
            zoom
        );

        for rule in rules {
            self.paint_rule(grid, viewport, zoom, rule, &mut pixels);
        }

        RasterResult {
            pixels,
            width: grid.width as u32,
            height: grid.height as u32,
            corners: grid.corners(),
        }
    }

    fn paint_rule(
        &self,
        grid: &Grid,
        viewport: &Bounds,
        zoom: u8,
        rule: &GenerationRule,
        pixels: &mut [u8],
    ) {
        let area = match rule.bounds.intersection(viewport) {
            Some(area) => area,
            None => return,
        };

        let color = match rule.rgb() {
            Ok(color) => color,
            Err(e) => {
                warn!("Skipping rule: {}", e);
                return;
            }
        };

        let (columns, rows) = grid.cell_range(&area);
        if columns.is_empty() || rows.is_empty() {
            return;
        }

        let row_len = grid.width * 4;
        pixels[rows.start * row_len..rows.end * row_len]
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(i, row)| {
                let y = rows.start + i;
                for x in columns.clone() {
                    let point = grid.cell_center(x, y);
                    if !contains_inclusive(&area, point) {
                        continue;
                    }

                    if let Some(rgb) = self.classify(rule, color, zoom, point) {
                        row[x * 4..x * 4 + 4].copy_from_slice(&rgb.to_rgba());
                    }
                }
            });
    }

    /// The color `rule` paints at `point`, or `None` if the rule does not apply there.
    pub fn classify(
        &self,
        rule: &GenerationRule,
        color: Rgb,
        zoom: u8,
        point: Position,
    ) -> Option<Rgb> {
        if let Some(geometry) = &rule.geometry {
            if !geometry.contains(point) {
                return None;
            }
        }

        let elevation = self.model.elevation(zoom, point[0], point[1])?;
        if elevation < rule.min_elev || elevation > rule.max_elev {
            return None;
        }

        if !rule.needs_terrain() {
            return Some(color);
        }

        let sample = calculate_terrain_metrics(point, self.config.terrain_offset, |lng, lat| {
            self.model.elevation(zoom, lng, lat)
        })?;

        let mut level = rule.severity();
        if rule.filters_aspect() && !rule.valid_aspects.contains(&sample.aspect) {
            match self.config.aspect_policy {
                AspectPolicy::Exclude => return None,
                AspectPolicy::Downgrade if level == 0 => return None,
                AspectPolicy::Downgrade => level = level.saturating_sub(1).max(1),
            }
        }

        if let Some(min_slope) = rule.min_slope {
            if sample.slope < min_slope {
                return None;
            }
        }

        if !rule.apply_steepness_logic {
            return Some(color);
        }

        if let Some(cutoff) = self.config.steepness_cutoff {
            if sample.slope >= cutoff {
                return None;
            }
        }

        steepness_rating(level, sample.slope).map(|rating| self.config.palette.color(rating))
    }
}

fn contains_inclusive(area: &Bounds, [lng, lat]: Position) -> bool {
    lng >= area.min_lng && lng <= area.max_lng && lat >= area.min_lat && lat <= area.max_lat
}
