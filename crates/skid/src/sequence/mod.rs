mod manager;
mod registry;
mod scope;

pub use manager::*;
pub use registry::*;
pub use scope::*;
