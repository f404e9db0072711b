pub mod service;

pub use service::{MarketStatus, SessionService};
