use serde::Deserialize;

/// Engine configuration, read from `RANKING_`-prefixed environment
/// variables with defaults for every knob.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Seed for deterministic jitter and the exploration RNG.
    #[serde(default = "default_device_seed")]
    pub device_seed: u64,
    /// Base exploration rate stored into new preference state.
    #[serde(default = "default_initial_epsilon")]
    pub initial_epsilon: f32,
    /// Retained fraction of the momentum vector per EMA step.
    #[serde(default = "default_momentum_decay")]
    pub momentum_decay: f32,
    /// Items shown this recently are filtered from the candidate set.
    #[serde(default = "default_recently_shown_window")]
    pub recently_shown_window: usize,
    /// Recently shown items whose categories count as "recent".
    #[serde(default = "default_recent_category_window")]
    pub recent_category_window: usize,
    /// History records fetched per selection or feedback call.
    #[serde(default = "default_history_scan_limit")]
    pub history_scan_limit: usize,
    /// Size of the top-ranked pool sampled during exploration.
    #[serde(default = "default_explore_pool_size")]
    pub explore_pool_size: usize,
    /// Ranked items scanned for a category break during exploitation.
    #[serde(default = "default_exploit_scan_depth")]
    pub exploit_scan_depth: usize,
    /// Probability of restricting an explore draw to unseen categories.
    #[serde(default = "default_category_escape_probability")]
    pub category_escape_probability: f64,
    /// Cold-start base score for sources without a configured entry.
    #[serde(default = "default_source_base")]
    pub default_source_base: f32,
}

fn default_device_seed() -> u64 {
    0
}

fn default_initial_epsilon() -> f32 {
    0.1
}

fn default_momentum_decay() -> f32 {
    0.9
}

fn default_recently_shown_window() -> usize {
    10
}

fn default_recent_category_window() -> usize {
    3
}

fn default_history_scan_limit() -> usize {
    50
}

fn default_explore_pool_size() -> usize {
    100
}

fn default_exploit_scan_depth() -> usize {
    10
}

fn default_category_escape_probability() -> f64 {
    0.7
}

fn default_source_base() -> f32 {
    0.08
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device_seed: default_device_seed(),
            initial_epsilon: default_initial_epsilon(),
            momentum_decay: default_momentum_decay(),
            recently_shown_window: default_recently_shown_window(),
            recent_category_window: default_recent_category_window(),
            history_scan_limit: default_history_scan_limit(),
            explore_pool_size: default_explore_pool_size(),
            exploit_scan_depth: default_exploit_scan_depth(),
            category_escape_probability: default_category_escape_probability(),
            default_source_base: default_source_base(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        envy::prefixed("RANKING_").from_env()
    }
}
