//! Sensitivity analysis of transport poverty lines.
//!
//! The program sweeps a poverty-line parameter across accessibility scores, computes
//! Foster-Greer-Thorbecke poverty indices for each demographic group and renders classed maps
//! showing where disadvantage concentrates.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod access;
pub mod cli;
pub mod demographic;
pub mod equity;
pub mod error;
pub mod id;
pub mod input;
pub mod log;
pub mod map;
pub mod output;
pub mod poverty_line;
pub mod project;
pub mod region;
pub mod settings;
pub mod supply;
pub mod sweep;
pub mod threshold;
pub mod time_of_day;

#[cfg(test)]
mod fixture;

/// Get the config dir for the program.
///
/// The settings file lives here.
pub fn get_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("poverty-sweep");
    path
}
