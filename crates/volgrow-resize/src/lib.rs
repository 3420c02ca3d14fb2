//! volgrow-resize — the three stateless steps of a root-volume resize.
//!
//! # Components
//!
//! - **`initiator`** — resolves the root volume, computes the target size
//!   under the growth and ceiling policy, and issues the resize
//! - **`oracle`** — reports the lifecycle state of a volume's most recent
//!   modification
//! - **`expander`** — submits the partition and filesystem grow commands
//!
//! Each step re-reads backend state on every call and keeps nothing between
//! invocations. Sequencing, polling, and retry belong to the driver.
//!
//! # Sizing
//!
//! ```text
//! target = min(ceil(current * (1 + growth_percent / 100)), max_size_gib)
//!
//! if target <= current:              Skipped("already at max size")
//! elif state in {modifying, optimizing}: ConflictingModification
//! else:                              ModifyVolumeSize(target)
//! ```

pub mod expander;
pub mod initiator;
pub mod oracle;

pub use expander::{expand_filesystem, expansion_commands};
pub use initiator::{Assessment, initiate, plan_resize, target_size};
pub use oracle::check_state;
