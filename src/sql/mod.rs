//! Query assembly: identifiers from config or validated against view columns,
//! request values as bind arguments.

mod builder;
pub mod params;
pub mod sanitize;

pub use builder::*;
pub use params::*;
pub use sanitize::Criteria;
