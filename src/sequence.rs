//! Order-preserving sequence diffing with move detection.
//!
//! Pipeline: [`uniquify`] both sides, compute a [`canonical_diff`], then either
//! translate it into a live operation stream with [`replay_ops`] or into a
//! displayable unified list with [`visual_diff`]. All functions here are pure
//! and either return a correct result or an [`InvariantViolation`].
//!
//! [`InvariantViolation`]: crate::error::InvariantViolation

mod diff;
mod replay;
mod uniquify;
mod visual;

pub use diff::{canonical_diff, diff_sequences, EditScript, Insertion, Removal};
pub use replay::{apply_ops, checked_replay_ops, replay_ops, LiveOp};
pub use uniquify::{strip, uniquify, Unique};
pub use visual::{visual_diff, ChangeState, VisualEntry};
