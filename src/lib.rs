// src/lib.rs
pub mod config;
pub mod errors;
pub mod framing;
pub mod models;
pub mod pairing;
pub mod verdict;
pub mod watch;

pub use errors::{Result, WatchError};
pub use models::{ExecutionTask, ProgressEvent, Reason, ResultEvent, WatchEvent};
pub use verdict::Verdict;
pub use watch::{EventStream, WatchClient};
