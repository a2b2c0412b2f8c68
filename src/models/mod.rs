use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Dimension of the visual embedding produced by the feature extractor.
pub const EMBEDDING_DIM: usize = 576;

/// Default exploration rate for freshly created preference state.
pub const DEFAULT_EPSILON: f32 = 0.1;

/// A catalog item. Owned by the catalog; the engine borrows during a
/// selection call and clones only the returned item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallpaper {
    pub id: String,
    /// Unit-length visual embedding of `EMBEDDING_DIM` floats.
    pub embedding: Vec<f32>,
    /// May be empty when the upstream pipeline could not classify.
    #[serde(default)]
    pub category: String,
    /// Dominant colors as `#rrggbb` tokens, most dominant first.
    #[serde(default)]
    pub colors: Vec<String>,
    /// Perceived brightness, 0..=100.
    pub brightness: u8,
    /// Contrast, 0..=100.
    pub contrast: u8,
    pub width: u32,
    pub height: u32,
    /// Upstream collection the item came from.
    pub source: String,
}

impl Wallpaper {
    pub fn resolution_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FeedbackKind {
    Like,
    Dislike,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Like => "like",
            FeedbackKind::Dislike => "dislike",
        }
    }
}

/// A single explicit or implicit taste signal. Ephemeral: its effect is
/// folded into `PreferenceState` and the history log.
#[derive(Debug, Clone)]
pub struct FeedbackEvent {
    pub item_id: String,
    pub kind: FeedbackKind,
    /// 1.0 for explicit taps, reduced for implicit signals.
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackEvent {
    pub fn explicit(item_id: impl Into<String>, kind: FeedbackKind) -> Self {
        Self::implicit(item_id, kind, 1.0)
    }

    pub fn implicit(item_id: impl Into<String>, kind: FeedbackKind, confidence: f32) -> Self {
        Self {
            item_id: item_id.into(),
            kind,
            confidence: confidence.clamp(f32::EPSILON, 1.0),
            timestamp: Utc::now(),
        }
    }
}

/// Per-user preference model. Mutated exclusively by the preference
/// updater; readers always see a whole-value snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceState {
    /// All-zero until the first accepted Like, unit-length afterwards.
    pub preference_vector: Vec<f32>,
    /// Unnormalized blended delta from the last EMA step.
    pub momentum_vector: Vec<f32>,
    /// Fixed at initialization, never mutated afterwards.
    pub original_anchor: Option<Vec<f32>>,
    pub liked_ids: HashSet<String>,
    pub disliked_ids: HashSet<String>,
    pub feedback_count: u32,
    pub epsilon: f32,
    pub last_updated: DateTime<Utc>,
}

impl PreferenceState {
    /// Lazily created default: no anchor, no feedback, zero vectors.
    pub fn empty() -> Self {
        Self {
            preference_vector: vec![0.0; EMBEDDING_DIM],
            momentum_vector: vec![0.0; EMBEDDING_DIM],
            original_anchor: None,
            liked_ids: HashSet::new(),
            disliked_ids: HashSet::new(),
            feedback_count: 0,
            epsilon: DEFAULT_EPSILON,
            last_updated: Utc::now(),
        }
    }

    pub fn has_feedback(&self) -> bool {
        self.feedback_count > 0
    }

    /// The bootstrapping phase the state is in. `Learning` is entered on
    /// the first accepted feedback event and is never left.
    pub fn phase(&self) -> LearningPhase {
        if self.has_feedback() {
            LearningPhase::Learning
        } else {
            LearningPhase::ColdStart
        }
    }
}

/// Explicit phase tag, checked by the pipeline instead of inferring the
/// branch from vector contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningPhase {
    /// No state exists in the store yet.
    Uninitialized,
    /// State exists but no feedback has been accepted.
    ColdStart,
    /// At least one feedback event has been folded in.
    Learning,
}

/// Append-only log entry for one shown wallpaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub item_id: String,
    pub applied_at: DateTime<Utc>,
    /// Set by the rotation collaborator when the wallpaper is replaced.
    pub removed_at: Option<DateTime<Utc>>,
    pub explicit_feedback: Option<FeedbackKind>,
}

impl HistoryRecord {
    pub fn applied(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            applied_at: Utc::now(),
            removed_at: None,
            explicit_feedback: None,
        }
    }
}
