pub mod archive;
pub mod cli;
pub mod composer;
pub mod config;
pub mod download;
pub mod error;
pub mod executor;
pub mod host;
pub mod installer;
pub mod options;
pub mod privilege;
pub mod python;

pub use error::{Error, Result};
