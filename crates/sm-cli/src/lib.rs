//! Playback metrics CLI library.
//!
//! Wires the event store, the aggregator and the metrics client into the
//! `sm` commands and the live sampling loop.

mod cli;
pub mod commands;
mod config;
pub mod sampler;
pub mod tracker;

pub use cli::{Cli, Commands};
pub use config::{Config, Intervals};
