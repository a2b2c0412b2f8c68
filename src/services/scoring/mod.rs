/// Content Scorer
///
/// Dual-anchor ranking score for learned-phase selection: similarity to the
/// fixed original anchor and to the continuously learned preference vector,
/// blended on a schedule that shifts trust toward the learned vector as
/// feedback accumulates, plus additive category/color/composition/diversity
/// boosts and a deterministic tie-breaking jitter.
use std::collections::HashMap;

use tracing::debug;

use crate::models::{PreferenceState, Wallpaper};
use crate::services::embedding;
use crate::utils::{deterministic_jitter, parse_hex_color};

/// Feedback count at which the anchor/learned blend stops shifting.
const BLEND_SATURATION_COUNT: f32 = 50.0;

/// Maximum RGB distance between two colors.
const MAX_COLOR_DISTANCE: f32 = 441.673; // sqrt(3 * 255^2)

/// Additive boost weights.
#[derive(Debug, Clone)]
pub struct ScoringWeights {
    /// Category like/dislike affinity.
    pub category: f32,
    /// Color-palette fallback when the item has no category.
    pub color: f32,
    /// Learned composition-profile match.
    pub composition: f32,
    /// Penalty per recent occurrence of the item's category.
    pub recency_penalty: f32,
    /// Bonus for rarely seen categories.
    pub novelty_bonus: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            category: 0.15,
            color: 0.12,
            composition: 0.08,
            recency_penalty: 0.05,
            novelty_bonus: 0.05,
        }
    }
}

/// Like/dislike counts for one category.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryStats {
    pub likes: u32,
    pub dislikes: u32,
}

impl CategoryStats {
    /// Affinity in [-1, 1]: dislikes weigh double, smoothed by one
    /// pseudo-observation.
    pub fn preference_score(&self) -> f32 {
        let likes = self.likes as f32;
        let dislikes = self.dislikes as f32;
        ((likes - 2.0 * dislikes) / (likes + dislikes + 1.0)).clamp(-1.0, 1.0)
    }
}

/// Brightness/contrast layout profile, each component in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositionProfile {
    pub brightness: f32,
    pub contrast: f32,
}

impl CompositionProfile {
    pub fn of(item: &Wallpaper) -> Self {
        Self {
            brightness: item.brightness as f32 / 100.0,
            contrast: item.contrast as f32 / 100.0,
        }
    }

    /// Mean profile over a set of items. None when the set is empty.
    pub fn mean(items: &[&Wallpaper]) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        let n = items.len() as f32;
        let sum = items.iter().fold((0.0, 0.0), |acc, item| {
            let p = Self::of(item);
            (acc.0 + p.brightness, acc.1 + p.contrast)
        });
        Some(Self {
            brightness: sum.0 / n,
            contrast: sum.1 / n,
        })
    }

    /// Similarity in [0, 1]: one minus mean absolute difference.
    pub fn similarity(&self, other: &Self) -> f32 {
        let diff = ((self.brightness - other.brightness).abs()
            + (self.contrast - other.contrast).abs())
            / 2.0;
        1.0 - diff
    }
}

/// Auxiliary ranking signals, each defaulting to a neutral contribution
/// when absent. Missing data degrades a boost to zero, never the whole
/// scoring call.
#[derive(Debug, Clone, Default)]
pub struct AuxiliarySignals {
    /// Per-category like/dislike counts from feedback history.
    pub category_stats: HashMap<String, CategoryStats>,
    /// Colors of previously liked items.
    pub liked_colors: Vec<String>,
    /// Mean composition profile over liked items.
    pub composition_profile: Option<CompositionProfile>,
    /// Recorded views per category, all history.
    pub category_view_counts: HashMap<String, u32>,
}

/// A candidate with its ranking score. Borrowed for the duration of one
/// selection call.
#[derive(Debug, Clone, Copy)]
pub struct ScoredWallpaper<'a> {
    pub wallpaper: &'a Wallpaper,
    pub score: f32,
}

pub struct ContentScorer {
    weights: ScoringWeights,
    device_seed: u64,
}

impl ContentScorer {
    pub fn new(device_seed: u64) -> Self {
        Self {
            weights: ScoringWeights::default(),
            device_seed,
        }
    }

    pub fn with_weights(device_seed: u64, weights: ScoringWeights) -> Self {
        Self {
            weights,
            device_seed,
        }
    }

    /// Anchor/learned blend weights for a given feedback count.
    ///
    /// Anchor decays 0.40 -> 0.20, learned grows 0.60 -> 0.78 over the
    /// first `BLEND_SATURATION_COUNT` feedback events.
    pub fn blend_weights(feedback_count: u32) -> (f32, f32) {
        let progress = (feedback_count as f32 / BLEND_SATURATION_COUNT).min(1.0);
        let anchor = 0.4 * (1.0 - 0.5 * progress);
        let learned = 0.6 * (1.0 + 0.3 * progress);
        (anchor, learned)
    }

    /// Dual-anchor ranking score for one candidate.
    pub fn score(
        &self,
        state: &PreferenceState,
        item: &Wallpaper,
        recent_categories: &[String],
        aux: &AuxiliarySignals,
    ) -> f32 {
        let preference_similarity =
            embedding::cosine_similarity(&state.preference_vector, &item.embedding).unwrap_or(0.0);

        let base = match &state.original_anchor {
            Some(anchor) => {
                let original_similarity =
                    embedding::cosine_similarity(anchor, &item.embedding).unwrap_or(0.0);
                let (anchor_weight, learned_weight) = Self::blend_weights(state.feedback_count);
                original_similarity * anchor_weight + preference_similarity * learned_weight
            }
            None => preference_similarity,
        };

        let content_boost = self.content_boost(item, aux);
        let composition_boost = self.composition_boost(item, aux);
        let diversity_boost = self.diversity_boost(item, recent_categories, aux);
        let jitter = deterministic_jitter(self.device_seed, &item.id);

        let score = base + content_boost + composition_boost + diversity_boost + jitter;

        debug!(
            item_id = %item.id,
            base = base,
            content_boost = content_boost,
            composition_boost = composition_boost,
            diversity_boost = diversity_boost,
            score = score,
            "Scored candidate"
        );

        score
    }

    /// Score and sort a candidate set, best first.
    pub fn score_all<'a, I>(
        &self,
        state: &PreferenceState,
        items: I,
        recent_categories: &[String],
        aux: &AuxiliarySignals,
    ) -> Vec<ScoredWallpaper<'a>>
    where
        I: IntoIterator<Item = &'a Wallpaper>,
    {
        let mut ranked: Vec<ScoredWallpaper<'a>> = items
            .into_iter()
            .map(|item| ScoredWallpaper {
                wallpaper: item,
                score: self.score(state, item, recent_categories, aux),
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    /// Category affinity when a category exists, otherwise a color match
    /// against previously liked palettes.
    fn content_boost(&self, item: &Wallpaper, aux: &AuxiliarySignals) -> f32 {
        if !item.category.is_empty() {
            return aux
                .category_stats
                .get(&item.category)
                .map(|stats| stats.preference_score() * self.weights.category)
                .unwrap_or(0.0);
        }

        self.color_similarity(item, &aux.liked_colors) * self.weights.color
    }

    /// Nearest-liked-color similarity in [0, 1]; 0 without liked colors
    /// or parseable tokens.
    fn color_similarity(&self, item: &Wallpaper, liked_colors: &[String]) -> f32 {
        let liked: Vec<(u8, u8, u8)> = liked_colors
            .iter()
            .filter_map(|token| parse_hex_color(token))
            .collect();
        if liked.is_empty() {
            return 0.0;
        }

        let mut nearest = f32::MAX;
        for token in &item.colors {
            let Some((r, g, b)) = parse_hex_color(token) else {
                continue;
            };
            for (lr, lg, lb) in &liked {
                let dr = r as f32 - *lr as f32;
                let dg = g as f32 - *lg as f32;
                let db = b as f32 - *lb as f32;
                let dist = (dr * dr + dg * dg + db * db).sqrt();
                nearest = nearest.min(dist);
            }
        }
        if nearest == f32::MAX {
            return 0.0;
        }

        1.0 - nearest / MAX_COLOR_DISTANCE
    }

    /// Composition-profile match scaled to [-1, 1]; 0 without history.
    fn composition_boost(&self, item: &Wallpaper, aux: &AuxiliarySignals) -> f32 {
        match &aux.composition_profile {
            Some(profile) => {
                let similarity = profile.similarity(&CompositionProfile::of(item));
                (similarity * 2.0 - 1.0) * self.weights.composition
            }
            None => 0.0,
        }
    }

    /// Penalize categories shown in the recent window, reward categories
    /// with fewer than three recorded views.
    fn diversity_boost(
        &self,
        item: &Wallpaper,
        recent_categories: &[String],
        aux: &AuxiliarySignals,
    ) -> f32 {
        let occurrences = recent_categories
            .iter()
            .filter(|c| **c == item.category)
            .count() as f32;

        let views = aux
            .category_view_counts
            .get(&item.category)
            .copied()
            .unwrap_or(0);
        let novelty = if views < 3 {
            self.weights.novelty_bonus
        } else {
            0.0
        };

        -self.weights.recency_penalty * occurrences + novelty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EMBEDDING_DIM;

    fn basis(index: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[index] = 1.0;
        v
    }

    fn wallpaper(id: &str, embedding: Vec<f32>, category: &str) -> Wallpaper {
        Wallpaper {
            id: id.to_string(),
            embedding,
            category: category.to_string(),
            colors: vec!["#2e3440".to_string(), "#88c0d0".to_string()],
            brightness: 45,
            contrast: 55,
            width: 2560,
            height: 1440,
            source: "linuxdotexe/nordic-wallpapers".to_string(),
        }
    }

    fn learning_state(feedback_count: u32) -> PreferenceState {
        let mut state = PreferenceState::empty();
        state.preference_vector = basis(0);
        state.original_anchor = Some(basis(0));
        state.feedback_count = feedback_count;
        state
    }

    #[test]
    fn test_blend_weight_schedule() {
        let (anchor, learned) = ContentScorer::blend_weights(0);
        assert!((anchor - 0.40).abs() < 1e-6);
        assert!((learned - 0.60).abs() < 1e-6);

        let (anchor, learned) = ContentScorer::blend_weights(50);
        assert!((anchor - 0.20).abs() < 1e-6);
        assert!((learned - 0.78).abs() < 1e-6);

        // Saturates past the threshold.
        assert_eq!(
            ContentScorer::blend_weights(50),
            ContentScorer::blend_weights(500)
        );
    }

    #[test]
    fn test_blend_weight_sum_stays_sane() {
        for count in 0..200 {
            let (anchor, learned) = ContentScorer::blend_weights(count);
            let sum = anchor + learned;
            assert!(
                (0.95..=1.05).contains(&sum),
                "weight sum {sum} out of bounds at count {count}"
            );
        }
    }

    #[test]
    fn test_aligned_item_outranks_orthogonal() {
        let scorer = ContentScorer::new(0);
        let state = learning_state(5);
        let aux = AuxiliarySignals::default();

        let aligned = wallpaper("a", basis(0), "nature");
        let orthogonal = wallpaper("b", basis(1), "anime");

        let score_a = scorer.score(&state, &aligned, &[], &aux);
        let score_b = scorer.score(&state, &orthogonal, &[], &aux);
        assert!(score_a > score_b);
    }

    #[test]
    fn test_category_stats_drive_boost_sign() {
        let liked = CategoryStats {
            likes: 5,
            dislikes: 0,
        };
        let disliked = CategoryStats {
            likes: 0,
            dislikes: 5,
        };
        assert!(liked.preference_score() > 0.0);
        assert_eq!(disliked.preference_score(), -1.0);
        assert_eq!(CategoryStats::default().preference_score(), 0.0);
    }

    #[test]
    fn test_color_fallback_used_without_category() {
        let scorer = ContentScorer::new(0);
        let state = learning_state(5);

        let mut aux = AuxiliarySignals::default();
        aux.liked_colors = vec!["#2e3440".to_string()];

        let uncategorized = wallpaper("a", basis(0), "");
        let with_colors = scorer.score(&state, &uncategorized, &[], &aux);
        let without_colors =
            scorer.score(&state, &uncategorized, &[], &AuxiliarySignals::default());

        // Exact palette hit: full color weight.
        assert!(with_colors > without_colors);
        assert!((with_colors - without_colors - 0.12).abs() < 1e-5);
    }

    #[test]
    fn test_recent_category_is_penalized() {
        let scorer = ContentScorer::new(0);
        let state = learning_state(5);
        let aux = AuxiliarySignals::default();
        let item = wallpaper("a", basis(0), "nature");

        let fresh = scorer.score(&state, &item, &[], &aux);
        let recent = vec!["nature".to_string(), "nature".to_string()];
        let repeated = scorer.score(&state, &item, &recent, &aux);

        assert!((fresh - repeated - 0.10).abs() < 1e-5);
    }

    #[test]
    fn test_novelty_bonus_disappears_after_three_views() {
        let scorer = ContentScorer::new(0);
        let state = learning_state(5);
        let item = wallpaper("a", basis(0), "space");

        let novel = scorer.score(&state, &item, &[], &AuxiliarySignals::default());

        let mut aux = AuxiliarySignals::default();
        aux.category_view_counts.insert("space".to_string(), 7);
        let seen = scorer.score(&state, &item, &[], &aux);

        assert!((novel - seen - 0.05).abs() < 1e-5);
    }

    #[test]
    fn test_composition_boost_neutral_without_history() {
        let scorer = ContentScorer::new(0);
        let item = wallpaper("a", basis(0), "nature");
        assert_eq!(
            scorer.composition_boost(&item, &AuxiliarySignals::default()),
            0.0
        );

        let mut aux = AuxiliarySignals::default();
        aux.composition_profile = Some(CompositionProfile::of(&item));
        // Perfect match scales to the full positive weight.
        assert!((scorer.composition_boost(&item, &aux) - 0.08).abs() < 1e-6);
    }

    #[test]
    fn test_score_without_anchor_uses_preference_only() {
        let scorer = ContentScorer::new(0);
        let mut state = learning_state(5);
        state.original_anchor = None;
        let aux = AuxiliarySignals::default();

        let item = wallpaper("a", basis(0), "nature");
        let score = scorer.score(&state, &item, &[], &aux);
        // preference similarity 1.0 + novelty 0.05 + jitter
        let jitter = deterministic_jitter(0, "a");
        assert!((score - (1.0 + 0.05 + jitter)).abs() < 1e-5);
    }

    #[test]
    fn test_score_all_sorts_descending() {
        let scorer = ContentScorer::new(0);
        let state = learning_state(5);
        let aux = AuxiliarySignals::default();

        let items = vec![
            wallpaper("a", basis(1), "anime"),
            wallpaper("b", basis(0), "nature"),
            wallpaper("c", basis(2), "city"),
        ];

        let ranked = scorer.score_all(&state, &items, &[], &aux);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].wallpaper.id, "b");
        assert!(ranked[0].score >= ranked[1].score);
        assert!(ranked[1].score >= ranked[2].score);
    }
}
