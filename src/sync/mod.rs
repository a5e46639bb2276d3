//! Realtime change feed.
//!
//! - [`transport`] - wire frames and the streaming HTTP transport
//! - [`feed`] - subscription lifecycle, reconnect, and the typed event queue

pub mod feed;
pub mod transport;

pub use feed::{
    ChangeFeedClient, ConnectionState, FeedConfig, FeedEvent, FeedMessage, Subscription,
};
pub use transport::{
    parse_frame, DeletedRecord, FeedError, FeedFrame, FeedTransport, FrameStream,
    HttpFeedTransport, MAX_FRAME_SIZE,
};
