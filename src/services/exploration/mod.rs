/// Exploration Controller
///
/// Epsilon-greedy selection over a ranked candidate list. A run of recent
/// dislikes inflates the effective epsilon, so a user who keeps rejecting
/// what the model serves gets pushed toward unexplored territory instead
/// of more of the same. All randomness enters through the injected RNG.
use rand::Rng;
use tracing::{debug, info};

use crate::models::{FeedbackKind, HistoryRecord, Wallpaper};
use crate::services::scoring::ScoredWallpaper;

pub struct ExplorationController {
    /// Top-ranked pool size sampled during exploration.
    explore_pool_size: usize,
    /// Ranked items scanned for a category break during exploitation.
    exploit_scan_depth: usize,
    /// Probability of restricting an explore draw to unseen categories.
    category_escape_probability: f64,
}

impl Default for ExplorationController {
    fn default() -> Self {
        Self {
            explore_pool_size: 100,
            exploit_scan_depth: 10,
            category_escape_probability: 0.7,
        }
    }
}

impl ExplorationController {
    pub fn new(
        explore_pool_size: usize,
        exploit_scan_depth: usize,
        category_escape_probability: f64,
    ) -> Self {
        Self {
            explore_pool_size,
            exploit_scan_depth,
            category_escape_probability,
        }
    }

    /// Count the dislike streak at the head of the history. Entries with
    /// no feedback do not break the streak; the first like ends it.
    pub fn consecutive_dislikes(history: &[HistoryRecord]) -> u32 {
        let mut streak = 0;
        for record in history {
            match record.explicit_feedback {
                Some(FeedbackKind::Dislike) => streak += 1,
                Some(FeedbackKind::Like) => break,
                None => continue,
            }
        }
        streak
    }

    /// Epsilon inflation per consecutive-dislike streak length.
    fn dislike_boost(consecutive_dislikes: u32) -> f32 {
        match consecutive_dislikes {
            0 => 0.0,
            1 => 0.1,
            2 => 0.3,
            _ => 0.6,
        }
    }

    /// Effective exploration rate, capped at 1.
    pub fn effective_epsilon(epsilon: f32, history: &[HistoryRecord]) -> f32 {
        let streak = Self::consecutive_dislikes(history);
        (epsilon + Self::dislike_boost(streak)).min(1.0)
    }

    /// Pick one item from a descending-ranked list.
    ///
    /// `history` must be ordered most recent first; `recent_categories`
    /// are the categories of the last few shown items.
    pub fn select<'a, R: Rng>(
        &self,
        ranked: &[ScoredWallpaper<'a>],
        epsilon: f32,
        recent_categories: &[String],
        history: &[HistoryRecord],
        rng: &mut R,
    ) -> Option<&'a Wallpaper> {
        if ranked.is_empty() {
            return None;
        }

        let epsilon_effective = Self::effective_epsilon(epsilon, history);

        if rng.gen::<f32>() < epsilon_effective {
            let selection = self.explore(ranked, recent_categories, rng);
            info!(
                item_id = %selection.id,
                epsilon_effective = epsilon_effective,
                "Explored"
            );
            return Some(selection);
        }

        let selection = self.exploit(ranked, recent_categories);
        debug!(
            item_id = %selection.id,
            epsilon_effective = epsilon_effective,
            "Exploited"
        );
        Some(selection)
    }

    /// Uniform draw from the top pool, preferring unseen categories most
    /// of the time.
    fn explore<'a, R: Rng>(
        &self,
        ranked: &[ScoredWallpaper<'a>],
        recent_categories: &[String],
        rng: &mut R,
    ) -> &'a Wallpaper {
        let pool = &ranked[..ranked.len().min(self.explore_pool_size)];

        if rng.gen_bool(self.category_escape_probability) {
            let unseen: Vec<&ScoredWallpaper<'a>> = pool
                .iter()
                .filter(|s| !recent_categories.contains(&s.wallpaper.category))
                .collect();
            if !unseen.is_empty() {
                return unseen[rng.gen_range(0..unseen.len())].wallpaper;
            }
        }

        pool[rng.gen_range(0..pool.len())].wallpaper
    }

    /// First of the top ranked items whose category breaks the recent
    /// run; the single best item when none does.
    fn exploit<'a>(
        &self,
        ranked: &[ScoredWallpaper<'a>],
        recent_categories: &[String],
    ) -> &'a Wallpaper {
        ranked
            .iter()
            .take(self.exploit_scan_depth)
            .find(|s| !recent_categories.contains(&s.wallpaper.category))
            .unwrap_or(&ranked[0])
            .wallpaper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EMBEDDING_DIM;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn wallpaper(id: &str, category: &str) -> Wallpaper {
        Wallpaper {
            id: id.to_string(),
            embedding: vec![0.0; EMBEDDING_DIM],
            category: category.to_string(),
            colors: Vec::new(),
            brightness: 50,
            contrast: 50,
            width: 1920,
            height: 1080,
            source: "makccr/wallpapers".to_string(),
        }
    }

    fn record(item_id: &str, feedback: Option<FeedbackKind>) -> HistoryRecord {
        HistoryRecord {
            explicit_feedback: feedback,
            ..HistoryRecord::applied(item_id)
        }
    }

    fn ranked_list(items: &[Wallpaper]) -> Vec<ScoredWallpaper<'_>> {
        items
            .iter()
            .enumerate()
            .map(|(i, wallpaper)| ScoredWallpaper {
                wallpaper,
                score: 1.0 - i as f32 * 0.1,
            })
            .collect()
    }

    #[test]
    fn test_consecutive_dislikes_counting() {
        let history = vec![
            record("a", Some(FeedbackKind::Dislike)),
            record("b", None),
            record("c", Some(FeedbackKind::Dislike)),
            record("d", Some(FeedbackKind::Like)),
            record("e", Some(FeedbackKind::Dislike)),
        ];
        // Two dislikes before the like; the unrated record is skipped.
        assert_eq!(ExplorationController::consecutive_dislikes(&history), 2);

        assert_eq!(ExplorationController::consecutive_dislikes(&[]), 0);
    }

    #[test]
    fn test_dislike_streak_inflates_epsilon() {
        let none: Vec<HistoryRecord> = Vec::new();
        assert_eq!(ExplorationController::effective_epsilon(0.1, &none), 0.1);

        let one = vec![record("a", Some(FeedbackKind::Dislike))];
        assert!((ExplorationController::effective_epsilon(0.1, &one) - 0.2).abs() < 1e-6);

        let three = vec![
            record("a", Some(FeedbackKind::Dislike)),
            record("b", Some(FeedbackKind::Dislike)),
            record("c", Some(FeedbackKind::Dislike)),
        ];
        assert!((ExplorationController::effective_epsilon(0.1, &three) - 0.7).abs() < 1e-6);

        // Capped at 1.
        assert_eq!(ExplorationController::effective_epsilon(0.9, &three), 1.0);
    }

    #[test]
    fn test_exploit_prefers_category_break() {
        let controller = ExplorationController::default();
        let items = vec![
            wallpaper("a", "nature"),
            wallpaper("b", "nature"),
            wallpaper("c", "city"),
        ];
        let ranked = ranked_list(&items);
        let recent = vec!["nature".to_string()];
        let mut rng = StdRng::seed_from_u64(1);

        // epsilon 0 forces the exploit branch.
        let selected = controller.select(&ranked, 0.0, &recent, &[], &mut rng).unwrap();
        assert_eq!(selected.id, "c");
    }

    #[test]
    fn test_exploit_falls_back_to_top_when_all_recent() {
        // Three candidates, all in the recently shown category: the top
        // ranked item wins since no alternative exists.
        let controller = ExplorationController::default();
        let items = vec![
            wallpaper("a", "nature"),
            wallpaper("b", "nature"),
            wallpaper("c", "nature"),
        ];
        let ranked = ranked_list(&items);
        let recent = vec!["nature".to_string()];
        let mut rng = StdRng::seed_from_u64(1);

        let selected = controller.select(&ranked, 0.0, &recent, &[], &mut rng).unwrap();
        assert_eq!(selected.id, "a");
    }

    #[test]
    fn test_empty_candidates_yield_none() {
        let controller = ExplorationController::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(controller.select(&[], 0.5, &[], &[], &mut rng).is_none());
    }

    #[test]
    fn test_forced_exploration_draws_from_pool() {
        let controller = ExplorationController::default();
        let items: Vec<Wallpaper> = (0..20)
            .map(|i| wallpaper(&format!("w{i}"), if i % 2 == 0 { "nature" } else { "city" }))
            .collect();
        let ranked = ranked_list(&items);
        let mut rng = StdRng::seed_from_u64(7);

        // epsilon 1.0 always explores.
        for _ in 0..50 {
            let selected = controller
                .select(&ranked, 1.0, &["nature".to_string()], &[], &mut rng)
                .unwrap();
            assert!(items.iter().any(|w| w.id == selected.id));
        }
    }

    #[test]
    fn test_exploration_rate_matches_epsilon() {
        // Statistical bound: with epsilon 0.1 and no dislikes, the explore
        // branch triggers in 8-12% of 10000 seeded draws. Exploit always
        // returns the top item here since every candidate shares one
        // category and none is recent, so any other selection means the
        // explore branch ran.
        let controller = ExplorationController::default();
        let items: Vec<Wallpaper> = (0..50)
            .map(|i| wallpaper(&format!("w{i}"), "nature"))
            .collect();
        let ranked = ranked_list(&items);
        let mut rng = StdRng::seed_from_u64(42);

        let trials = 10_000;
        let mut explored = 0;
        for _ in 0..trials {
            let selected = controller.select(&ranked, 0.1, &[], &[], &mut rng).unwrap();
            if selected.id != "w0" {
                explored += 1;
            }
        }

        // The explore branch picks w0 itself 1/50 of the time, so the
        // observed rate underestimates epsilon slightly.
        let rate = explored as f64 / trials as f64;
        assert!(
            (0.08..=0.12).contains(&rate),
            "explore rate {rate} outside statistical bound"
        );
    }
}
