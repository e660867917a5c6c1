mod provider;
mod stage;

pub use provider::{EmbedProvider, OpenAiEmbedProvider};
pub use stage::{input_text, normalize, EmbeddingStage};
