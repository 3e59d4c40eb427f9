//! Seq Log-Shipping Sink
//!
//! This library encodes structured log events as compact newline-delimited
//! JSON (CLEF) and delivers them in size-bounded batches over HTTP to a
//! Seq-compatible ingestion endpoint, adapting to the server's
//! minimum-accepted-level directive.

pub mod batch;
pub mod config;
pub mod encoder;
pub mod errors;
pub mod events;
pub mod forwarder;
pub mod json;
pub mod levels;
pub mod template;
pub mod transport;

pub use config::{Config, EventLayout, ExtraProperty};
pub use errors::{Result, SinkError};
pub use events::{Describable, EventValue, LogEvent};
pub use forwarder::{EventOutcome, SeqForwarder, ShipReport};
pub use levels::{Level, LevelGovernor};
