pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::EngineConfig;
pub use models::{
    FeedbackEvent, FeedbackKind, HistoryRecord, LearningPhase, PreferenceState, Wallpaper,
    EMBEDDING_DIM,
};
pub use services::{
    ColdStartSampler, ContentScorer, ExplorationController, InMemoryCatalog,
    InMemoryPreferenceStore, PreferenceStore, PreferenceUpdater, RedisPreferenceStore,
    SelectionPipeline, WallpaperCatalog,
};
