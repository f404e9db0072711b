pub mod source;
pub mod stream;
pub mod twelve_data;
pub mod websocket;

pub use source::MarketDataSource;
pub use stream::{StreamHandle, StreamState, TickCallback};
pub use twelve_data::TwelveDataClient;
pub use websocket::{FeedConnection, FeedEvent, FeedTransport, WebSocketTransport};
