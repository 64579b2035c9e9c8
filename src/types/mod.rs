pub mod month_window;
pub mod series;
pub mod station;
