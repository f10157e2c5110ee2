pub mod catalog;
pub mod config;
pub mod decode;
pub mod find;
pub mod generators;
pub mod manifest;
pub mod plugins;
