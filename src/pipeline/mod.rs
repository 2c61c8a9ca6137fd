/// Pipeline building blocks
///
/// This module contains the per-request context, the command type,
/// the sequence builder and the error values commands produce.

mod context;
mod error;
mod sequence;
mod step;

pub use context::{Context, Record, Response};
pub use error::{CapsuleKind, ErrorCapsule, ExecutionError};
pub use sequence::{Sequence, SequenceBuilder, SequenceError};
pub use step::{flatten, Command, CommandResult, Flow, Step};
