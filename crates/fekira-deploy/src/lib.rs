#[macro_use]
extern crate lazy_static;

pub mod artifacts;
pub mod chain;
pub mod config;
pub mod constants;
pub mod deploy;
mod errors;
pub mod fixtures;
pub mod handle;
pub mod registry;
pub mod resolver;

pub use errors::Error;
