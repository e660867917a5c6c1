mod protect;
mod sweep;

pub use protect::{articles_to_delete, protected_article_ids};
pub use sweep::{RetentionSweeper, SweepReport};
