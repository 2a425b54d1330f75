pub mod error;
mod path;
mod store;
mod template;

pub use crate::path::{sanitize_file_name, validate as validate_path};
pub use crate::store::{LinkMode, MediaStore, StoreOptions};
pub use crate::template::PathGenerator;
use std::sync::Arc;

pub type StoreHandle = Arc<MediaStore>;
