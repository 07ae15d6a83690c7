pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod utils;

pub use cli::*;
pub use commands::*;
pub use utils::*;
