use crate::tile::TileKey;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid YAML in overlay document.")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tile request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tile request to {url} returned HTTP {status}")]
    TileStatus { url: String, status: u16 },

    #[error("Unable to decode tile image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Tile {key} is {width}x{height}, expected {expected}x{expected}")]
    UnexpectedTileSize {
        key: TileKey,
        width: u32,
        height: u32,
        expected: u32,
    },

    #[error("Viewport has no area or non-finite bounds")]
    InvalidViewport,

    #[error("No terrain tiles are available for the viewport")]
    NoTerrain,

    #[error("Invalid color {0:?}, expected #RRGGBB")]
    InvalidColor(String),

    #[error("Unknown aspect {0:?}")]
    UnknownAspect(String),
}
