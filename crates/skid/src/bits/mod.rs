mod builder;
mod error;
mod layout;
mod parser;

pub use builder::*;
pub use error::*;
pub use layout::*;
pub use parser::*;
