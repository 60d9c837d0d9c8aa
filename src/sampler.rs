//! Session cache of decoded elevation tiles and bilinear elevation lookups.
//!
//! Tiles are fetched at a single working zoom derived from the map zoom. A fetch that
//! fails is remembered as failed and never retried until [`TileSampler::clear_cache`].

use crate::config::SamplerConfig;
use crate::error::Error;
use crate::geometry::Bounds;
use crate::tile::{
    project, tile_for, tiles_per_side, working_zoom, ElevationTile, TileKey, MAX_TILE_ZOOM,
};
use crate::{ElevationModel, TileSource};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::future::{join, join_all, FutureExt, Shared};
use log::{debug, warn};

/// Tile zoom used before the first fetch.
const INITIAL_TILE_ZOOM: u8 = 10;

/// Resolves once the batch fetching a tile has stored it, or was dropped.
type Settled = Shared<oneshot::Receiver<()>>;

#[derive(Clone, Debug)]
pub enum TileEntry {
    Decoded(Arc<ElevationTile>),
    FetchFailed,
}

#[derive(Default)]
struct TileCache {
    tiles: HashMap<TileKey, TileEntry>,
    in_flight: HashMap<TileKey, Settled>,
}

/// Keys of one fetch batch. Dropping it unmarks them as in flight and then wakes every
/// caller waiting on them, whether the batch finished or was cancelled.
struct InFlight<'a> {
    cache: &'a RwLock<TileCache>,
    keys: Vec<TileKey>,
    _settled: oneshot::Sender<()>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        for key in &self.keys {
            cache.in_flight.remove(key);
        }
    }
}

pub struct TileSampler<S> {
    source: S,
    config: SamplerConfig,
    cache: RwLock<TileCache>,
    zoom: AtomicU8,
}

impl<S: TileSource> TileSampler<S> {
    pub fn new(source: S, config: SamplerConfig) -> Result<TileSampler<S>, Error> {
        config.validate()?;
        let zoom = INITIAL_TILE_ZOOM.min(config.max_tile_zoom);

        Ok(TileSampler {
            source,
            config,
            cache: RwLock::new(TileCache::default()),
            zoom: AtomicU8::new(zoom),
        })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Zoom of the most recent fetch, which [`TileSampler::get_elevation`] reads from.
    pub fn tile_zoom(&self) -> u8 {
        self.zoom.load(Ordering::Relaxed)
    }

    /// Every tile intersecting `bounds` at `zoom`, column by column.
    pub fn tiles_covering(bounds: &Bounds, zoom: u8) -> Vec<TileKey> {
        let top_left = tile_for(bounds.min_lng, bounds.max_lat, zoom);
        let bottom_right = tile_for(bounds.max_lng, bounds.min_lat, zoom);

        (top_left.x..=bottom_right.x)
            .flat_map(|x| (top_left.y..=bottom_right.y).map(move |y| TileKey::new(zoom, x, y)))
            .collect()
    }

    /// Fetches and decodes every uncached tile covering `bounds` at the working zoom for
    /// `viewport_zoom`, all concurrently, and returns that zoom. Tiles another call is
    /// already fetching are waited for rather than requested again. Individual failures
    /// are cached and logged; the call only fails when not a single covering tile is
    /// usable.
    pub async fn fetch_tiles(&self, bounds: &Bounds, viewport_zoom: f64) -> Result<u8, Error> {
        let edges = [bounds.min_lng, bounds.max_lng, bounds.min_lat, bounds.max_lat];
        if edges.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidViewport);
        }

        let zoom = working_zoom(
            viewport_zoom,
            self.config.zoom_offset,
            self.config.max_tile_zoom,
        );
        self.zoom.store(zoom, Ordering::Relaxed);

        let keys = Self::tiles_covering(bounds, zoom);

        // A batch dropped before it finished leaves its keys without an entry, so go
        // around again until every key has one.
        loop {
            let (in_flight, waiting) = self.claim(&keys);
            if in_flight.keys.is_empty() && waiting.is_empty() {
                break;
            }

            debug!(
                "Fetching {} of {} tiles at zoom {}, waiting on {} more",
                in_flight.keys.len(),
                keys.len(),
                zoom,
                waiting.len()
            );

            let fetches = join_all(in_flight.keys.iter().map(|key| self.load_tile(*key)));
            let (loaded, _) = join(fetches, join_all(waiting)).await;

            self.write().tiles.extend(loaded);
            drop(in_flight);
        }

        let usable = {
            let cache = self.read();
            keys.iter()
                .any(|key| matches!(cache.tiles.get(key), Some(TileEntry::Decoded(_))))
        };

        if usable {
            Ok(zoom)
        } else {
            Err(Error::NoTerrain)
        }
    }

    /// Marks the uncached keys nobody is fetching yet as fetched by the caller. Returns
    /// them along with the signals of the keys other calls are still fetching.
    fn claim(&self, keys: &[TileKey]) -> (InFlight<'_>, Vec<Settled>) {
        let (sender, receiver) = oneshot::channel();
        let settled = receiver.shared();

        let mut claimed = Vec::new();
        let mut waiting = Vec::new();
        {
            let mut guard = self.write();
            let cache = &mut *guard;
            for key in keys {
                if cache.tiles.contains_key(key) {
                    continue;
                }

                match cache.in_flight.get(key) {
                    Some(other) => waiting.push(other.clone()),
                    None => claimed.push(*key),
                }
            }
            for key in &claimed {
                cache.in_flight.insert(*key, settled.clone());
            }
        }

        let in_flight = InFlight {
            cache: &self.cache,
            keys: claimed,
            _settled: sender,
        };
        (in_flight, waiting)
    }

    async fn load_tile(&self, key: TileKey) -> (TileKey, TileEntry) {
        let decoded = match self.source.fetch_tile(key).await {
            Ok(data) => ElevationTile::from_png(key, &data, self.config.tile_size),
            Err(e) => Err(e),
        };

        match decoded {
            Ok(tile) => (key, TileEntry::Decoded(Arc::new(tile))),
            Err(e) => {
                warn!("Error loading tile {}: {}", key, e);
                (key, TileEntry::FetchFailed)
            }
        }
    }

    /// Elevation in meters from the tiles of the most recent fetch. See
    /// [`TileSampler::elevation_at`].
    pub fn get_elevation(&self, lng: f64, lat: f64) -> Option<f64> {
        self.elevation_at(self.tile_zoom(), lng, lat)
    }

    /// Elevation in meters from the tiles at `zoom`, bilinearly interpolated between the
    /// four pixels around the point. Neighbors past a tile edge are read from the
    /// adjacent tile. When only some of the four are available the first available one
    /// is returned as is.
    pub fn elevation_at(&self, zoom: u8, lng: f64, lat: f64) -> Option<f64> {
        if zoom > MAX_TILE_ZOOM {
            return None;
        }

        let size = self.config.tile_size as i64;

        let (tile_x, tile_y) = project(lng, lat, zoom);
        let px = tile_x * size as f64;
        let py = tile_y * size as f64;
        if !px.is_finite() || !py.is_finite() {
            return None;
        }

        let x0 = px.floor();
        let y0 = py.floor();
        let (dx, dy) = (px - x0, py - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);

        let cache = self.read();
        let sample = |x: i64, y: i64| Self::pixel_elevation(&cache, zoom, size, x, y);

        let h00 = sample(x0, y0);
        let h10 = sample(x0 + 1, y0);
        let h01 = sample(x0, y0 + 1);
        let h11 = sample(x0 + 1, y0 + 1);

        match (h00, h10, h01, h11) {
            (Some(h00), Some(h10), Some(h01), Some(h11)) => {
                Some(bilinear([h00, h10, h01, h11], dx, dy))
            }
            _ => h00.or(h10).or(h01).or(h11),
        }
    }
    /// Reads a pixel addressed in world pixel coordinates at `zoom`.
    fn pixel_elevation(cache: &TileCache, zoom: u8, size: i64, x: i64, y: i64) -> Option<f64> {
        let n = tiles_per_side(zoom) as i64;
        let tile_y = y.div_euclid(size);
        if tile_y < 0 || tile_y >= n {
            return None;
        }
        let tile_x = x.div_euclid(size).rem_euclid(n);

        match cache.tiles.get(&TileKey::new(zoom, tile_x as u32, tile_y as u32))? {
            TileEntry::Decoded(tile) => {
                tile.elevation(x.rem_euclid(size) as u32, y.rem_euclid(size) as u32)
            }
            TileEntry::FetchFailed => None,
        }
    }

    pub fn cache_entry(&self, key: &TileKey) -> Option<TileEntry> {
        self.read().tiles.get(key).cloned()
    }

    pub fn cached_tiles(&self) -> usize {
        self.read().tiles.len()
    }

    /// Forgets every tile, including failed ones.
    pub fn clear_cache(&self) {
        self.write().tiles.clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, TileCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TileCache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Interpolates corner values `[h00, h10, h01, h11]` at offset `(dx, dy)` in `[0, 1)²`
/// from the first corner.
pub fn bilinear(corners: [f64; 4], dx: f64, dy: f64) -> f64 {
    let [h00, h10, h01, h11] = corners;
    let top = h00 * (1.0 - dx) + h10 * dx;
    let bottom = h01 * (1.0 - dx) + h11 * dx;
    top * (1.0 - dy) + bottom * dy
}

#[async_trait]
impl<S: TileSource> ElevationModel for TileSampler<S> {
    async fn prepare(&self, bounds: &Bounds, viewport_zoom: f64) -> Result<u8, Error> {
        self.fetch_tiles(bounds, viewport_zoom).await
    }

    fn elevation(&self, zoom: u8, lng: f64, lat: f64) -> Option<f64> {
        self.elevation_at(zoom, lng, lat)
    }
}
