pub mod analysis_config;
pub mod source_config;

pub use analysis_config::*;
pub use source_config::*;
