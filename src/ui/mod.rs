/// View helpers
///
/// - `chart.rs` - one sample chart card (title, step slider, sample image)

pub mod chart;
