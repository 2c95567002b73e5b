//! Search module - filtering and alternative lookup over the dataset / 搜索模块
//!
//! All operations are synchronous scans over the immutable [`Dataset`]:
//! - `search`: query / manufacturer / status filtering
//! - `find_alternatives`: rows sharing composition words
//!
//! [`Dataset`]: crate::dataset::Dataset

pub mod alternatives;
pub mod engine;
pub mod tokenizer;

pub use alternatives::{find_alternatives, MAX_ALTERNATIVES};
pub use engine::{search, SearchQuery, StatusFilter, DEFAULT_LIMIT};
