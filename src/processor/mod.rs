pub mod attribute_extractor;
pub mod comparable_builder;
pub mod price_parser;

pub use attribute_extractor::*;
pub use comparable_builder::*;
pub use price_parser::*;
