//! volgrow-core — shared types for elastic root-volume growth.
//!
//! Holds everything the resize components and the driver agree on:
//!
//! - **`types`** — instances, volumes, modifications, and the step records
//!   threaded through a pipeline run
//! - **`config`** — explicit configuration records (no process globals)
//! - **`error`** — the error taxonomy (misconfiguration, conflict, backend)
//! - **`backend`** — the storage and remote-execution traits
//! - **`memory`** — an in-memory backend for tests and dry runs

pub mod backend;
pub mod config;
pub mod error;
pub mod memory;
pub mod types;

pub use backend::{CommandAck, ModifyAck, RemoteExecApi, StorageApi};
pub use config::{ExpanderConfig, GrowthConfig, PollConfig, RetryConfig, VolgrowConfig};
pub use error::{BackendError, BackendResult, ErrorKind, VolgrowError, VolgrowResult};
pub use memory::MemoryCloud;
pub use types::*;
