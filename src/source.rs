use crate::config::SamplerConfig;
use crate::error::Error;
use crate::tile::TileKey;
use crate::TileSource;

use async_trait::async_trait;
use once_cell::sync::Lazy;

static CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Terrain-RGB tiles served over HTTP at `{base_url}/{z}/{x}/{y}.png?key={api_key}`.
#[derive(Clone, Debug)]
pub struct HttpTileSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTileSource {
    /// Uses a client shared by every source in the process.
    pub fn new(config: &SamplerConfig) -> HttpTileSource {
        HttpTileSource::with_client(CLIENT.clone(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &SamplerConfig) -> HttpTileSource {
        HttpTileSource {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn tile_url(&self, key: TileKey) -> String {
        format!(
            "{}/{}/{}/{}.png?key={}",
            self.base_url, key.zoom, key.x, key.y, self.api_key
        )
    }
}

#[async_trait]
impl TileSource for HttpTileSource {
    async fn fetch_tile(&self, key: TileKey) -> Result<Vec<u8>, Error> {
        let url = self.tile_url(key);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::TileStatus {
                url,
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_url() {
        let config = SamplerConfig {
            base_url: String::from("https://tiles.example.com/terrain-rgb/"),
            api_key: String::from("abc123"),
            ..SamplerConfig::default()
        };
        let source = HttpTileSource::new(&config);

        assert_eq!(
            "https://tiles.example.com/terrain-rgb/10/544/361.png?key=abc123",
            source.tile_url(TileKey::new(10, 544, 361))
        );
    }
}
