//! volgrow-driver — sequences the resize steps.
//!
//! The resize components never sleep, loop, or retry. This crate supplies
//! that behavior around them:
//!
//! - **`poll`** — call the state oracle until it reports a non-pending state
//! - **`retry`** — re-run a step after a conflicting modification, with
//!   exponential backoff
//! - **`pipeline`** — initiate → poll → expand, threading a
//!   [`PipelineContext`](volgrow_core::PipelineContext) that can be persisted
//!   and resumed between steps
//!
//! ```text
//! initiate ──skipped──▶ done
//!    │ initiated
//!    ▼
//! poll state ──pending──▶ sleep ─┐
//!    │  ▲                        │
//!    │  └────────────────────────┘
//!    ├──completed──▶ expand ──▶ done
//!    └──other──────▶ ModificationFailed
//! ```

pub mod error;
pub mod pipeline;
pub mod poll;
pub mod retry;

pub use error::{DriverError, DriverResult};
pub use pipeline::Pipeline;
pub use poll::poll_until_terminal;
pub use retry::{Backoff, retry_on_conflict};
