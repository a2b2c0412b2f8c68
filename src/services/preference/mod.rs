/// Preference Updater
///
/// Folds a single feedback event into the preference state using an
/// EMA-with-momentum step. Pure: the same state, event, and embedding
/// always produce the same new state.
///
/// Update rule after bootstrap:
///   step      = ±rate · (embedding − preference)   (+ Like, − Dislike)
///   momentum' = momentum_decay · momentum + step
///   pref'     = normalize(pref + momentum')
///
/// The learning rate adapts to how much feedback exists, so early signals
/// move the vector further than late ones, and dislikes always move it
/// further than likes of the same age.
use thiserror::Error;
use tracing::debug;

use crate::models::{FeedbackEvent, FeedbackKind, PreferenceState, EMBEDDING_DIM};
use crate::services::embedding;

#[derive(Debug, Error, PartialEq)]
pub enum PreferenceError {
    #[error("invalid embedding size: expected {expected}, got {actual}")]
    InvalidEmbeddingSize { expected: usize, actual: usize },

    #[error("negative feedback requires an established baseline")]
    NoBaselineForNegativeFeedback,
}

pub type Result<T> = std::result::Result<T, PreferenceError>;

/// Base learning rate before confidence scaling.
fn base_learning_rate(feedback_count: u32, kind: FeedbackKind) -> f32 {
    match (feedback_count, kind) {
        (0..=9, FeedbackKind::Like) => 0.15,
        (0..=9, FeedbackKind::Dislike) => 0.20,
        (10..=49, FeedbackKind::Like) => 0.10,
        (10..=49, FeedbackKind::Dislike) => 0.15,
        (_, FeedbackKind::Like) => 0.05,
        (_, FeedbackKind::Dislike) => 0.10,
    }
}

pub struct PreferenceUpdater {
    /// Retained fraction of the momentum vector per step.
    momentum_decay: f32,
}

impl Default for PreferenceUpdater {
    fn default() -> Self {
        Self {
            momentum_decay: 0.9,
        }
    }
}

impl PreferenceUpdater {
    pub fn new(momentum_decay: f32) -> Self {
        Self { momentum_decay }
    }

    /// Apply one feedback event, returning the new state.
    ///
    /// The first Like on an empty vector assigns the candidate embedding
    /// directly (no EMA); a Dislike before any Like is rejected since
    /// there is no baseline to move away from.
    pub fn update(
        &self,
        state: &PreferenceState,
        event: &FeedbackEvent,
        candidate_embedding: &[f32],
    ) -> Result<PreferenceState> {
        if candidate_embedding.len() != EMBEDDING_DIM {
            return Err(PreferenceError::InvalidEmbeddingSize {
                expected: EMBEDDING_DIM,
                actual: candidate_embedding.len(),
            });
        }

        let mut next = state.clone();

        if embedding::is_zero(&state.preference_vector) {
            match event.kind {
                FeedbackKind::Dislike => {
                    return Err(PreferenceError::NoBaselineForNegativeFeedback)
                }
                FeedbackKind::Like => {
                    next.preference_vector = embedding::normalize(candidate_embedding);
                    next.momentum_vector = vec![0.0; EMBEDDING_DIM];
                    debug!(
                        item_id = %event.item_id,
                        "Bootstrapped preference vector from first like"
                    );
                }
            }
        } else {
            let rate = base_learning_rate(state.feedback_count, event.kind) * event.confidence;
            let sign = match event.kind {
                FeedbackKind::Like => 1.0,
                FeedbackKind::Dislike => -1.0,
            };

            let mut blended = vec![0.0; EMBEDDING_DIM];
            let mut raw = vec![0.0; EMBEDDING_DIM];
            for i in 0..EMBEDDING_DIM {
                let delta = candidate_embedding[i] - state.preference_vector[i];
                let momentum = state.momentum_vector.get(i).copied().unwrap_or(0.0);
                blended[i] = self.momentum_decay * momentum + sign * rate * delta;
                raw[i] = state.preference_vector[i] + blended[i];
            }

            next.preference_vector = embedding::normalize(&raw);
            next.momentum_vector = blended;

            debug!(
                item_id = %event.item_id,
                kind = event.kind.as_str(),
                rate = rate,
                feedback_count = state.feedback_count,
                "Applied EMA preference update"
            );
        }

        match event.kind {
            FeedbackKind::Like => {
                next.liked_ids.insert(event.item_id.clone());
            }
            FeedbackKind::Dislike => {
                next.disliked_ids.insert(event.item_id.clone());
            }
        }
        next.feedback_count = state.feedback_count + 1;
        next.last_updated = event.timestamp;

        Ok(next)
    }
}
