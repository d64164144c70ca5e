//! Analytics events and publishing
//!
//! Immutable events published onto the pub/sub bus for warehouse ingestion.
//! The publisher batches internally (up to 10 messages or 1 second) and is
//! flushed on shutdown. Publish failures are logged, never propagated.

pub mod events;
pub mod publisher;

pub use events::{sha256_hex, AnalyticsEvent, EventPayload, EventType};
pub use publisher::{
    AnalyticsPublisher, EventBus, HttpEventBus, HttpEventBusConfig, InMemoryBus, WireMessage,
};

use thiserror::Error;

/// Analytics errors
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("publish error: {0}")]
    Publish(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("publisher is shut down")]
    ShutDown,
}

impl From<AnalyticsError> for clauselens_core::Error {
    fn from(err: AnalyticsError) -> Self {
        clauselens_core::Error::Analytics(err.to_string())
    }
}
