pub mod evaluator;
pub mod hedonic_model;
pub mod pipeline;
pub mod reporter;

pub use evaluator::*;
pub use hedonic_model::*;
pub use pipeline::*;
pub use reporter::*;
