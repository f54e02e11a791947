//! Safe SQL builder: identifiers from table descriptions only, values as parameters.

mod builder;
pub mod params;
pub mod predicate;
pub use builder::*;
pub use params::*;
pub use predicate::{CompareOp, Predicate};
