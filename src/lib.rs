//! Viewer for image samples logged across training steps.
//!
//! Each chart shows one (run, tag) series and lets the user scrub through
//! its steps. The per-chart logic (step cache, debounce, display handles)
//! lives in [`state`] and [`resource`]; [`source`] and [`import`] feed it
//! from a SQLite catalog of log directory samples.

pub mod config;
pub mod error;
pub mod import;
pub mod resource;
pub mod source;
pub mod state;
pub mod ui;
