#![deny(warnings)]

mod backend;
mod loopback;
mod native;

pub use backend::*;
pub use loopback::*;
pub use native::*;
