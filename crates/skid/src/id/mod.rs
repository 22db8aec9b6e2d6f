mod generator;
mod source_known;
#[cfg(test)]
mod tests;

pub use generator::*;
pub use source_known::*;
