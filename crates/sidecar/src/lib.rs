pub mod error;
pub mod nfo;
pub mod strm;

pub use crate::nfo::{MultiPart, NfoOptions};
