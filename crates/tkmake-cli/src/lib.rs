//! tkmake library - resolution, generator dispatch and recursive builds
//!
//! The binary is a thin layer over these modules; they are exposed here so
//! they can be driven from tests and other tools.

pub mod commands;
pub mod common;
pub mod driver;
pub mod errors;
pub mod generator;
pub mod orchestrator;
pub mod project;
pub mod resolver;

pub use common::GlobalOpts;
