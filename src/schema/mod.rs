pub mod types;
pub mod registry;
pub mod validator;
pub mod resolved;

pub use types::*;
pub use registry::*;
pub use resolved::*;
