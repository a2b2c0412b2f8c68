pub mod catalog;
pub mod cold_start;
pub mod embedding;
pub mod exploration;
pub mod pipeline;
pub mod preference;
pub mod scoring;
pub mod store;

pub use catalog::{InMemoryCatalog, WallpaperCatalog};
pub use cold_start::ColdStartSampler;
pub use exploration::ExplorationController;
pub use pipeline::SelectionPipeline;
pub use preference::PreferenceUpdater;
pub use scoring::ContentScorer;
pub use store::{InMemoryPreferenceStore, PreferenceStore, RedisPreferenceStore};
