pub mod discover;
pub mod error;
pub mod flags;
pub mod fragment;
pub mod ident;
pub mod process;
pub mod queue;

pub use crate::flags::{MediaFlags, NamingStyle};
pub use crate::fragment::{FragmentGroup, FragmentInfo};
pub use crate::process::{BatchCounters, BatchEvent, Context, ProcessOutcome};
pub use crate::queue::QueueItem;
