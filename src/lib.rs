#![doc = include_str!("../README.md")]

mod error;
pub use error::*;
mod solver;
pub use solver::*;
mod angles;
pub use angles::*;
mod config;
pub use config::*;
pub mod fixed;
pub mod hdl;
pub use hdl::Verilog;
pub mod model;
mod rotation;
pub use rotation::*;
mod spline;
pub use spline::*;
mod sintable;
pub use sintable::*;
mod hexfile;
pub use hexfile::*;
mod metadata;
pub use metadata::*;
mod generator;
pub use generator::*;

#[cfg(test)]
pub mod testing;
