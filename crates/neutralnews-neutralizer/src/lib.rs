mod image;
mod llm;
mod prompt;
mod rate_limiter;
mod sources;
mod stage;

pub use image::{is_valid_image_url, select_most_neutral_image};
pub use llm::{classify, LlmClient, OpenAiLlmClient};
pub use prompt::{NeutralAnalysis, SourceRating, SYSTEM_PROMPT};
pub use rate_limiter::RateLimiter;
pub use sources::{prepare_sources_text, reduced_sources_text, select_sources, CandidateSource, SelectionResult};
pub use stage::{GroupResult, Neutralizer};
