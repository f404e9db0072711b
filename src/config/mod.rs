pub mod loader;

pub use loader::{load_config, parse_market_time, parse_timezone};
