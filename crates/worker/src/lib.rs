//! Floe worker.
//!
//! Loads [`Settings`], picks the backend once through [`ConnectorKind`], and
//! runs splits with [`SplitWorker`], each in its own task feeding a bounded
//! channel.

pub mod config;
pub mod error;
pub mod factory;
pub mod service;

pub use config::{RangeSettings, Settings};
pub use error::WorkerError;
pub use factory::ConnectorKind;
pub use service::{CancellationFlag, ChannelSink, SplitHandle, SplitWorker};
