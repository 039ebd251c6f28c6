#![forbid(unsafe_code)]

pub mod http;
pub mod sink;

pub use sink::{
    AnalyticsSource, Backend, EventSink, InMemoryEventLog, SourceError, TransportError,
};
