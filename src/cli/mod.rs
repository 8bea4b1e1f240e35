//! Command-line interface

mod args;
mod commands;

pub use args::{Args, SubCommand};
pub use commands::dispatch;
