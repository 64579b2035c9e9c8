pub mod cubic;
pub mod resampler;
