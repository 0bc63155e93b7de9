pub mod cli;
pub mod config;
pub mod embed;
pub mod indexer;
pub mod query;
pub mod scan;
pub mod store;
pub mod utils;

pub use config::Opts;
pub use embed::Extractor;
pub use store::WeaviateStore;
