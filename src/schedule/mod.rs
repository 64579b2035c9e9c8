pub mod acquisition;
pub mod decision;
pub mod error;
pub mod resampling;
pub mod state;
