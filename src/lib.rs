pub mod types;
pub mod error;
pub mod config;
pub mod time;
pub mod data;
pub mod broker;
pub mod session;
pub mod utils;

pub use types::*;
pub use error::{QuoteError, Result};
