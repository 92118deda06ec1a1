pub mod extraction_fetcher;
pub mod file_source;

pub use extraction_fetcher::*;
pub use file_source::*;
