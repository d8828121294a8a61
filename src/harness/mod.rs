//! Runtime harness to execute services in the context of modules

mod heart;
mod listener;
mod module;

pub use heart::*;
pub use listener::*;
pub use module::*;
