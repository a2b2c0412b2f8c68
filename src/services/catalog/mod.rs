/// Wallpaper Catalog
///
/// Boundary to the externally synced item catalog. The curation pipeline
/// publishes a manifest with precomputed embeddings, dominant colors, and
/// tonal metrics per wallpaper; `parse_manifest` validates it into domain
/// items. The embedding dimension is the catalog's guarantee and is
/// enforced here, so downstream scoring never sees a mis-sized vector.
use std::collections::HashMap;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::models::{Wallpaper, EMBEDDING_DIM};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Read-only catalog contract.
#[async_trait]
pub trait WallpaperCatalog: Send + Sync {
    async fn list(&self) -> Result<Vec<Wallpaper>>;

    async fn get(&self, id: &str) -> Result<Option<Wallpaper>>;
}

/// Catalog held fully in memory, as synced manifests are.
pub struct InMemoryCatalog {
    items: Vec<Wallpaper>,
    index: HashMap<String, usize>,
}

impl InMemoryCatalog {
    pub fn new(items: Vec<Wallpaper>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.clone(), i))
            .collect();
        Self { items, index }
    }

    /// Build a catalog from the curation pipeline's manifest JSON.
    pub fn from_manifest(json: &str) -> anyhow::Result<Self> {
        Ok(Self::new(parse_manifest(json)?))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl WallpaperCatalog for InMemoryCatalog {
    async fn list(&self) -> Result<Vec<Wallpaper>> {
        Ok(self.items.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Wallpaper>> {
        Ok(self.index.get(id).map(|i| self.items[*i].clone()))
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[allow(dead_code)]
    version: u32,
    embedding_dim: usize,
    wallpapers: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    id: String,
    /// Upstream collection, e.g. `dharmx/walls`.
    repo: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    colors: Vec<String>,
    brightness: u8,
    contrast: u8,
    embedding: Vec<f32>,
    /// `WIDTHxHEIGHT`.
    resolution: String,
}

/// Parse and validate a catalog manifest.
///
/// Fails fast when the declared or actual embedding dimension differs
/// from what the scorer expects, or when a resolution field is mangled.
pub fn parse_manifest(json: &str) -> anyhow::Result<Vec<Wallpaper>> {
    let manifest: Manifest = serde_json::from_str(json).context("malformed manifest")?;

    if manifest.embedding_dim != EMBEDDING_DIM {
        bail!(
            "manifest embedding_dim {} does not match expected {}",
            manifest.embedding_dim,
            EMBEDDING_DIM
        );
    }

    let mut items = Vec::with_capacity(manifest.wallpapers.len());
    for entry in manifest.wallpapers {
        if entry.embedding.len() != EMBEDDING_DIM {
            bail!(
                "wallpaper {} has invalid embedding size {}",
                entry.id,
                entry.embedding.len()
            );
        }
        let (width, height) = parse_resolution(&entry.resolution)
            .with_context(|| format!("wallpaper {} has invalid resolution", entry.id))?;

        items.push(Wallpaper {
            id: entry.id,
            embedding: entry.embedding,
            category: entry.category,
            colors: entry.colors,
            brightness: entry.brightness.min(100),
            contrast: entry.contrast.min(100),
            width,
            height,
            source: entry.repo,
        });
    }

    info!(item_count = items.len(), "Parsed catalog manifest");
    Ok(items)
}

fn parse_resolution(raw: &str) -> anyhow::Result<(u32, u32)> {
    let (width, height) = raw
        .split_once('x')
        .with_context(|| format!("expected WIDTHxHEIGHT, got {raw:?}"))?;
    Ok((width.parse()?, height.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_json(embedding_dim: usize, embedding_len: usize, resolution: &str) -> String {
        let embedding: Vec<String> = (0..embedding_len).map(|_| "0.1".to_string()).collect();
        format!(
            r##"{{
                "version": 1,
                "embedding_dim": {embedding_dim},
                "wallpapers": [{{
                    "id": "dharmx_abc123",
                    "repo": "dharmx/walls",
                    "category": "nature",
                    "colors": ["#282828", "#cc241d"],
                    "brightness": 42,
                    "contrast": 61,
                    "embedding": [{}],
                    "resolution": "{resolution}"
                }}]
            }}"##,
            embedding.join(",")
        )
    }

    #[test]
    fn test_parse_valid_manifest() {
        let json = manifest_json(EMBEDDING_DIM, EMBEDDING_DIM, "2560x1440");
        let items = parse_manifest(&json).unwrap();
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.id, "dharmx_abc123");
        assert_eq!(item.source, "dharmx/walls");
        assert_eq!((item.width, item.height), (2560, 1440));
        assert_eq!(item.embedding.len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_rejects_wrong_declared_dimension() {
        let json = manifest_json(128, 128, "1920x1080");
        assert!(parse_manifest(&json).is_err());
    }

    #[test]
    fn test_rejects_mis_sized_embedding() {
        let json = manifest_json(EMBEDDING_DIM, 10, "1920x1080");
        let err = parse_manifest(&json).unwrap_err();
        assert!(err.to_string().contains("invalid embedding size"));
    }

    #[test]
    fn test_rejects_mangled_resolution() {
        let json = manifest_json(EMBEDDING_DIM, EMBEDDING_DIM, "unknown");
        assert!(parse_manifest(&json).is_err());
    }

    #[tokio::test]
    async fn test_in_memory_catalog_lookup() {
        let json = manifest_json(EMBEDDING_DIM, EMBEDDING_DIM, "1920x1080");
        let catalog = InMemoryCatalog::from_manifest(&json).unwrap();
        assert_eq!(catalog.len(), 1);

        let item = catalog.get("dharmx_abc123").await.unwrap();
        assert!(item.is_some());
        assert!(catalog.get("missing").await.unwrap().is_none());
    }
}
