mod cache;
mod epoch;
mod hybrid;
mod interface;
#[cfg(test)]
mod tests;

pub use cache::*;
pub use epoch::*;
pub use hybrid::*;
pub use interface::*;
