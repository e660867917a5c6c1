pub mod config;
pub mod error;
pub mod outlets;
pub mod types;

pub use config::Config;
pub use error::{LlmErrorClass, PipelineError, Result};
pub use outlets::{Outlet, OutletProfile};
pub use types::{content_hash, normalize_link, tunables, word_count, Article, NeutralGroup};
