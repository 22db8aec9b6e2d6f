mod codec;
mod hasher;

pub use codec::*;
pub use hasher::*;
