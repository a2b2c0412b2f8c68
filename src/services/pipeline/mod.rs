/// Selection Pipeline
///
/// Orchestrates one selection round: load state, filter recently shown
/// items, rank with the cold-start sampler or the learned scorer, run the
/// epsilon-greedy controller, and log the result to history. Also carries
/// the caller-facing feedback and initialization entry points.
///
/// State updates are serialized under an exclusive lock so concurrent
/// feedback events cannot lose each other's writes; selection reads take
/// whole-value snapshots and never block updates.
use std::collections::HashMap;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::models::{
    FeedbackEvent, FeedbackKind, HistoryRecord, LearningPhase, PreferenceState, Wallpaper,
    EMBEDDING_DIM,
};
use crate::services::catalog::{CatalogError, WallpaperCatalog};
use crate::services::cold_start::ColdStartSampler;
use crate::services::embedding::{self, EmbeddingError};
use crate::services::exploration::ExplorationController;
use crate::services::preference::{PreferenceError, PreferenceUpdater};
use crate::services::scoring::{
    AuxiliarySignals, CategoryStats, CompositionProfile, ContentScorer,
};
use crate::services::store::{PreferenceStore, StoreError};

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no candidates available for selection")]
    NoCandidatesAvailable,

    #[error("preference state unavailable")]
    PreferencesUnavailable,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("invalid embedding size: expected {expected}, got {actual}")]
    InvalidEmbeddingSize { expected: usize, actual: usize },

    #[error("negative feedback requires an established baseline")]
    NoBaselineForNegativeFeedback,

    #[error("unknown item: {0}")]
    UnknownItem(String),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<PreferenceError> for FeedbackError {
    fn from(err: PreferenceError) -> Self {
        match err {
            PreferenceError::InvalidEmbeddingSize { expected, actual } => {
                FeedbackError::InvalidEmbeddingSize { expected, actual }
            }
            PreferenceError::NoBaselineForNegativeFeedback => {
                FeedbackError::NoBaselineForNegativeFeedback
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("at least one liked item is required")]
    NoLikedItems,

    #[error("invalid embedding size: expected {expected}, got {actual}")]
    InvalidEmbeddingSize { expected: usize, actual: usize },

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub struct SelectionPipeline<S, C> {
    store: S,
    catalog: C,
    config: EngineConfig,
    updater: PreferenceUpdater,
    scorer: ContentScorer,
    explorer: ExplorationController,
    cold_start: ColdStartSampler,
    /// Single RNG behind the exploration draw, seeded per device.
    rng: Mutex<StdRng>,
    /// Serializes the read-modify-write update path per user.
    update_lock: Mutex<()>,
}

impl<S, C> SelectionPipeline<S, C>
where
    S: PreferenceStore,
    C: WallpaperCatalog,
{
    pub fn new(store: S, catalog: C, config: EngineConfig) -> Self {
        Self {
            updater: PreferenceUpdater::new(config.momentum_decay),
            scorer: ContentScorer::new(config.device_seed),
            explorer: ExplorationController::new(
                config.explore_pool_size,
                config.exploit_scan_depth,
                config.category_escape_probability,
            ),
            cold_start: ColdStartSampler::new(config.device_seed, config.default_source_base),
            rng: Mutex::new(StdRng::seed_from_u64(config.device_seed)),
            update_lock: Mutex::new(()),
            store,
            catalog,
            config,
        }
    }

    /// Pick the next wallpaper to show and record it in the history log.
    pub async fn select_next(&self) -> Result<Wallpaper, SelectionError> {
        let state = self.load_or_create_state().await?;

        let (catalog_result, history_result) = futures::join!(
            self.catalog.list(),
            self.store.get_history(self.config.history_scan_limit)
        );
        let all_items = catalog_result.map_err(|e| {
            warn!(error = %e, "Catalog load failed");
            SelectionError::NoCandidatesAvailable
        })?;
        let history = history_result?;

        if all_items.is_empty() {
            return Err(SelectionError::NoCandidatesAvailable);
        }

        let by_id: HashMap<&str, &Wallpaper> =
            all_items.iter().map(|w| (w.id.as_str(), w)).collect();

        // Filter the recently shown window; an exhausted filter resets to
        // the full catalog rather than failing the call.
        let recently_shown: Vec<&str> = history
            .iter()
            .take(self.config.recently_shown_window)
            .map(|r| r.item_id.as_str())
            .collect();
        let mut candidates: Vec<&Wallpaper> = all_items
            .iter()
            .filter(|w| !recently_shown.contains(&w.id.as_str()))
            .collect();
        if candidates.is_empty() {
            candidates = all_items.iter().collect();
        }

        let recent_categories: Vec<String> = history
            .iter()
            .take(self.config.recent_category_window)
            .filter_map(|r| by_id.get(r.item_id.as_str()))
            .map(|w| w.category.clone())
            .collect();

        let phase = state.phase();
        let ranked = match phase {
            LearningPhase::Learning => {
                let aux = self.build_aux_signals(&state, &history, &by_id);
                self.scorer.score_all(
                    &state,
                    candidates.iter().copied(),
                    &recent_categories,
                    &aux,
                )
            }
            _ => self.cold_start.score_all(candidates.iter().copied()),
        };

        let selected = {
            let mut rng = self.rng.lock().await;
            self.explorer.select(
                &ranked,
                state.epsilon,
                &recent_categories,
                &history,
                &mut *rng,
            )
        }
        .ok_or(SelectionError::NoCandidatesAvailable)?
        .clone();

        self.store
            .append_history(HistoryRecord::applied(&selected.id))
            .await?;

        info!(
            item_id = %selected.id,
            category = %selected.category,
            phase = ?phase,
            candidate_count = candidates.len(),
            "Selected wallpaper"
        );

        Ok(selected)
    }

    /// Fold one explicit or implicit signal into the preference state.
    pub async fn submit_feedback(
        &self,
        item_id: &str,
        kind: FeedbackKind,
        confidence: f32,
    ) -> Result<(), FeedbackError> {
        let _guard = self.update_lock.lock().await;

        let item = self
            .catalog
            .get(item_id)
            .await?
            .ok_or_else(|| FeedbackError::UnknownItem(item_id.to_string()))?;

        let state = match self.store.get_state().await? {
            Some(state) => state,
            None => self.default_state(),
        };

        let event = FeedbackEvent::implicit(item_id, kind, confidence);
        let new_state = self.updater.update(&state, &event, &item.embedding)?;

        self.store.put_state(&new_state).await?;
        self.store.record_feedback(item_id, kind).await?;

        info!(
            item_id = %item_id,
            kind = kind.as_str(),
            feedback_count = new_state.feedback_count,
            "Feedback applied"
        );

        Ok(())
    }

    /// Seed preference state from an uploaded reference embedding and the
    /// items rated during onboarding. Requires at least one liked item.
    pub async fn initialize(
        &self,
        original_embedding: Vec<f32>,
        liked: &[Wallpaper],
        disliked: &[Wallpaper],
    ) -> Result<(), InitError> {
        if liked.is_empty() {
            return Err(InitError::NoLikedItems);
        }
        if original_embedding.len() != EMBEDDING_DIM {
            return Err(InitError::InvalidEmbeddingSize {
                expected: EMBEDDING_DIM,
                actual: original_embedding.len(),
            });
        }

        let _guard = self.update_lock.lock().await;

        let liked_embeddings: Vec<Vec<f32>> =
            liked.iter().map(|w| w.embedding.clone()).collect();
        let preference_vector = embedding::average(&liked_embeddings)?;

        let state = PreferenceState {
            preference_vector,
            momentum_vector: vec![0.0; EMBEDDING_DIM],
            original_anchor: Some(embedding::normalize(&original_embedding)),
            liked_ids: liked.iter().map(|w| w.id.clone()).collect(),
            disliked_ids: disliked.iter().map(|w| w.id.clone()).collect(),
            feedback_count: (liked.len() + disliked.len()) as u32,
            epsilon: self.config.initial_epsilon,
            last_updated: Utc::now(),
        };

        self.store.put_state(&state).await?;

        info!(
            liked = liked.len(),
            disliked = disliked.len(),
            "Initialized preference state"
        );

        Ok(())
    }

    /// Current learning phase, for callers that surface onboarding UI.
    pub async fn phase(&self) -> Result<LearningPhase, SelectionError> {
        match self.store.get_state().await {
            Ok(Some(state)) => Ok(state.phase()),
            Ok(None) => Ok(LearningPhase::Uninitialized),
            Err(e) => {
                warn!(error = %e, "State load failed");
                Err(SelectionError::PreferencesUnavailable)
            }
        }
    }

    fn default_state(&self) -> PreferenceState {
        let mut state = PreferenceState::empty();
        state.epsilon = self.config.initial_epsilon;
        state
    }

    async fn load_or_create_state(&self) -> Result<PreferenceState, SelectionError> {
        match self.store.get_state().await {
            Ok(Some(state)) => Ok(state),
            Ok(None) => {
                let state = self.default_state();
                self.store.put_state(&state).await.map_err(|e| {
                    warn!(error = %e, "Lazy state creation failed");
                    SelectionError::PreferencesUnavailable
                })?;
                Ok(state)
            }
            Err(e) => {
                warn!(error = %e, "State load failed");
                Err(SelectionError::PreferencesUnavailable)
            }
        }
    }

    /// Derive the scorer's auxiliary signals from feedback sets and the
    /// view history. Items that left the catalog simply stop contributing.
    fn build_aux_signals(
        &self,
        state: &PreferenceState,
        history: &[HistoryRecord],
        by_id: &HashMap<&str, &Wallpaper>,
    ) -> AuxiliarySignals {
        let mut category_stats: HashMap<String, CategoryStats> = HashMap::new();
        let mut liked_items: Vec<&Wallpaper> = Vec::new();

        for id in &state.liked_ids {
            if let Some(item) = by_id.get(id.as_str()) {
                liked_items.push(item);
                if !item.category.is_empty() {
                    category_stats
                        .entry(item.category.clone())
                        .or_default()
                        .likes += 1;
                }
            }
        }
        for id in &state.disliked_ids {
            if let Some(item) = by_id.get(id.as_str()) {
                if !item.category.is_empty() {
                    category_stats
                        .entry(item.category.clone())
                        .or_default()
                        .dislikes += 1;
                }
            }
        }

        let liked_colors: Vec<String> = liked_items
            .iter()
            .flat_map(|w| w.colors.iter().cloned())
            .collect();

        let composition_profile = CompositionProfile::mean(&liked_items);

        let mut category_view_counts: HashMap<String, u32> = HashMap::new();
        for record in history {
            if let Some(item) = by_id.get(record.item_id.as_str()) {
                if !item.category.is_empty() {
                    *category_view_counts.entry(item.category.clone()).or_insert(0) += 1;
                }
            }
        }

        AuxiliarySignals {
            category_stats,
            liked_colors,
            composition_profile,
            category_view_counts,
        }
    }
}
