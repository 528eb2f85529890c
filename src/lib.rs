pub mod cli;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod display;
pub mod pipeline;
pub mod record;
pub mod scene;
pub mod tsne;
pub mod utils;

pub use config::Opts;
