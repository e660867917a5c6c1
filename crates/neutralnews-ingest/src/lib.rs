mod enrich;
mod feed;

pub use enrich::{filter_known_links, ArticleEnricher, OutletCounters};
pub use feed::{FeedFetcher, RawItem};
