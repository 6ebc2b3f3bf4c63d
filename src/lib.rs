pub mod cli;
pub mod config;
pub mod features;
pub mod render;
pub mod scrape;
pub mod similarity;
pub mod utils;

pub use config::Opts;
