pub mod engine;

pub use engine::{LikeEngine, LikeEntry, LikeOutcome};
