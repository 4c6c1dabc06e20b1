//! Statement trees: identifiers from the registry only, values as parameters.

mod builder;
pub mod params;
pub(crate) use builder::{ident, qualified};
pub use builder::*;
pub use params::*;
