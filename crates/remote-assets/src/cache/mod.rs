//! # Cache System
//!
//! The on-disk side of the engine: the records kept for downloaded assets,
//! the `index.json` document that survives between builds, and expiry
//! computation from response headers.

mod store;
mod types;
mod utils;

pub use store::{CacheIndexStore, INDEX_FILE_NAME};
pub use types::{AssetRecord, CacheIndex, content_filename};
pub use utils::{compute_expiry, parse_max_age};
