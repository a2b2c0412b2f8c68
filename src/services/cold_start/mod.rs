/// Cold Start Sampler
///
/// Heuristic ranking used while no preference vector exists. Combines a
/// per-source base score (curated collections over bulk mirrors, to
/// correct for volume imbalance), a bounded quality score, and the same
/// deterministic jitter the learned scorer uses, so cold and warm ranking
/// feed one exploration path.
use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::models::Wallpaper;
use crate::services::scoring::ScoredWallpaper;
use crate::utils::deterministic_jitter;

/// Quality score ceiling.
const MAX_QUALITY: f32 = 0.3;

/// Base scores for the known upstream collections.
static DEFAULT_SOURCE_BASES: Lazy<HashMap<&'static str, f32>> = Lazy::new(|| {
    HashMap::from([
        ("DenverCoder1/minimalistic-wallpaper-collection", 0.15),
        ("linuxdotexe/nordic-wallpapers", 0.14),
        ("michaelScopic/Wallpapers", 0.12),
        ("fr0st-iwnl/wallz", 0.12),
        ("Mvcvalli/mobile-wallpapers", 0.10),
        ("dharmx/walls", 0.08),
        ("makccr/wallpapers", 0.08),
        ("D3Ext/aesthetic-wallpapers", 0.06),
    ])
});

/// Display aspect ratios the quality heuristic rewards.
const PREFERRED_ASPECTS: [f32; 3] = [16.0 / 9.0, 16.0 / 10.0, 9.0 / 16.0];

pub struct ColdStartSampler {
    source_bases: HashMap<String, f32>,
    default_source_base: f32,
    device_seed: u64,
}

impl ColdStartSampler {
    pub fn new(device_seed: u64, default_source_base: f32) -> Self {
        let source_bases = DEFAULT_SOURCE_BASES
            .iter()
            .map(|(source, base)| (source.to_string(), *base))
            .collect();
        Self {
            source_bases,
            default_source_base,
            device_seed,
        }
    }

    /// Override the per-source base table.
    pub fn with_source_bases(mut self, source_bases: HashMap<String, f32>) -> Self {
        self.source_bases = source_bases;
        self
    }

    /// Heuristic score: source base + quality + jitter.
    pub fn score(&self, item: &Wallpaper) -> f32 {
        let source_base = self
            .source_bases
            .get(&item.source)
            .copied()
            .unwrap_or(self.default_source_base);
        let quality = self.quality_score(item);
        let jitter = deterministic_jitter(self.device_seed, &item.id);

        let score = source_base + quality + jitter;

        debug!(
            item_id = %item.id,
            source_base = source_base,
            quality = quality,
            score = score,
            "Cold-start score computed"
        );

        score
    }

    /// Score and sort a candidate set, best first.
    pub fn score_all<'a, I>(&self, items: I) -> Vec<ScoredWallpaper<'a>>
    where
        I: IntoIterator<Item = &'a Wallpaper>,
    {
        let mut ranked: Vec<ScoredWallpaper<'a>> = items
            .into_iter()
            .map(|item| ScoredWallpaper {
                wallpaper: item,
                score: self.score(item),
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    /// Bounded quality heuristic over resolution, aspect fit, tonal
    /// balance, palette richness, and a category affinity hint.
    fn quality_score(&self, item: &Wallpaper) -> f32 {
        let quality = self.resolution_bonus(item)
            + self.aspect_bonus(item)
            + self.balance_bonus(item)
            + self.palette_bonus(item)
            + Self::category_affinity(&item.category);

        quality.clamp(0.0, MAX_QUALITY)
    }

    fn resolution_bonus(&self, item: &Wallpaper) -> f32 {
        match item.resolution_pixels() {
            p if p >= 3840 * 2160 => 0.08,
            p if p >= 2560 * 1440 => 0.06,
            p if p >= 1920 * 1080 => 0.04,
            p if p >= 1280 * 720 => 0.02,
            _ => 0.0,
        }
    }

    fn aspect_bonus(&self, item: &Wallpaper) -> f32 {
        if item.height == 0 {
            return 0.0;
        }
        let ratio = item.width as f32 / item.height as f32;
        let fits_display = PREFERRED_ASPECTS
            .iter()
            .any(|preferred| (ratio - preferred).abs() / preferred < 0.08);
        if fits_display {
            0.05
        } else {
            0.0
        }
    }

    /// Peaks at mid-range brightness and contrast, falls off linearly
    /// toward the extremes.
    fn balance_bonus(&self, item: &Wallpaper) -> f32 {
        let brightness = 0.04 * (1.0 - (item.brightness as f32 - 50.0).abs() / 50.0);
        let contrast = 0.04 * (1.0 - (item.contrast as f32 - 50.0).abs() / 50.0);
        brightness + contrast
    }

    fn palette_bonus(&self, item: &Wallpaper) -> f32 {
        let distinct: std::collections::HashSet<&str> =
            item.colors.iter().map(|c| c.as_str()).collect();
        match distinct.len() {
            n if n >= 5 => 0.04,
            n if n >= 3 => 0.02,
            _ => 0.0,
        }
    }

    /// Broadly appealing categories score higher before any feedback
    /// exists; niche theme categories start slightly negative; unknown
    /// categories are neutral.
    fn category_affinity(category: &str) -> f32 {
        match category {
            "nature" | "landscape" | "minimal" | "abstract" => 0.05,
            "space" | "city" | "gradient" => 0.03,
            "anime" | "gaming" | "gruvbox" | "nord" => -0.02,
            _ => 0.0,
        }
    }
}
