/// State management module
///
/// This module handles all viewer state, including:
/// - The SQLite sample catalog (catalog.rs)
/// - Shared data structures (data.rs)
/// - The per-step image cache (cache.rs)
/// - The step scrubbing state machine (scrub.rs)
/// - The per-chart controller composing them (controller.rs)

pub mod cache;
pub mod catalog;
pub mod controller;
pub mod data;
pub mod scrub;
