mod periodic;
#[cfg(test)]
mod tests;

pub use periodic::*;
