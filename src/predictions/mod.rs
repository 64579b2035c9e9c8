pub mod api;
pub mod error;
pub mod month_fetcher;
pub mod season;
pub mod table;
